use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        f.write_str(label)
    }
}

/// Change notifications sent to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The result set was rebuilt.
    Recalculated { revision: u64 },
    /// Something the user should see.
    Notice { level: NoticeLevel, message: String },
}

impl SessionEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        SessionEvent::Notice {
            level,
            message: message.into(),
        }
    }
}
