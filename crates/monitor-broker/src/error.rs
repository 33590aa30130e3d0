/// Failure of a single channel operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    Declare { queue: String, error: String },
    Publish { destination: String, error: String },
    Consume { queue: String, error: String },
    Ack(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declare { queue, error } => write!(f, "Failed to declare queue {}: {}", queue, error),
            Self::Publish { destination, error } => {
                write!(f, "Failed to publish to {}: {}", destination, error)
            }
            Self::Consume { queue, error } => {
                write!(f, "Failed to consume from {}: {}", queue, error)
            }
            Self::Ack(error) => write!(f, "Failed to settle delivery: {}", error),
        }
    }
}

impl std::error::Error for ChannelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_destination() {
        let err = ChannelError::Publish {
            destination: "monitoring-consumer".into(),
            error: "no responders".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("monitoring-consumer"));
        assert!(msg.contains("no responders"));
    }

    #[test]
    fn display_covers_every_operation() {
        let cases = [
            ChannelError::Declare {
                queue: "q".into(),
                error: "e".into(),
            },
            ChannelError::Consume {
                queue: "q".into(),
                error: "e".into(),
            },
            ChannelError::Ack("timed out".into()),
        ];
        for err in cases {
            assert!(!err.to_string().is_empty());
        }
    }
}
