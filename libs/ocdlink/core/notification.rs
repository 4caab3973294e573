//! Notification demultiplexing
//!
//! With notifications enabled the server interleaves unsolicited frames
//! with command responses on the same stream:
//!
//! ```text
//! #EVENT <event-token>      target lifecycle event
//! #STATE <state-token>      target execution state changed
//! #RESET <reset-token>      target reset mode
//! anything else             response to the pending command
//! ```
//!
//! Tokens are lowercase-hyphenated and matched case-insensitively against
//! fixed tables built once per process.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

macro_rules! token_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Every variant, in table order
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Protocol token for this variant
            pub fn token(self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.token())
            }
        }
    };
}

token_enum! {
    /// Target lifecycle events reported with `#EVENT`
    TargetEvent {
        GdbHalt => "gdb-halt",
        Halted => "halted",
        Resumed => "resumed",
        ResumeStart => "resume-start",
        ResumeEnd => "resume-end",
        GdbStart => "gdb-start",
        GdbEnd => "gdb-end",
        ResetStart => "reset-start",
        ResetAssertPre => "reset-assert-pre",
        ResetAssert => "reset-assert",
        ResetAssertPost => "reset-assert-post",
        ResetDeassertPre => "reset-deassert-pre",
        ResetDeassertPost => "reset-deassert-post",
        ResetHaltPre => "reset-halt-pre",
        ResetHaltPost => "reset-halt-post",
        ResetWaitPre => "reset-wait-pre",
        ResetWaitPost => "reset-wait-post",
        ResetInit => "reset-init",
        ResetEnd => "reset-end",
        DebugHalted => "debug-halted",
        DebugResumed => "debug-resumed",
        ExamineStart => "examine-start",
        ExamineEnd => "examine-end",
        GdbAttach => "gdb-attach",
        GdbDetach => "gdb-detach",
        GdbFlashEraseStart => "gdb-flash-erase-start",
        GdbFlashEraseEnd => "gdb-flash-erase-end",
        GdbFlashWriteStart => "gdb-flash-write-start",
        GdbFlashWriteEnd => "gdb-flash-write-end",
    }
}

token_enum! {
    /// Target execution state reported with `#STATE`
    TargetState {
        Unknown => "unknown",
        Running => "running",
        Halted => "halted",
        Reset => "reset",
        DebugRunning => "debug-running",
    }
}

token_enum! {
    /// Reset mode reported with `#RESET`
    TargetResetMode {
        Unknown => "unknown",
        Run => "run",
        Halt => "halt",
        Init => "init",
    }
}

/// Immutable token-to-variant table with case-insensitive lookup
pub struct EnumTable<T: 'static> {
    entries: HashMap<&'static str, T>,
}

impl<T> EnumTable<T>
where
    T: Copy + 'static,
{
    fn from_variants(variants: &[T], token: fn(T) -> &'static str) -> Self {
        Self {
            entries: variants.iter().map(|&v| (token(v), v)).collect(),
        }
    }

    /// Look up a token ignoring ASCII case
    pub fn lookup(&self, token: &str) -> Option<T> {
        self.entries.get(token.to_ascii_lowercase().as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub static TARGET_EVENTS: LazyLock<EnumTable<TargetEvent>> =
    LazyLock::new(|| EnumTable::from_variants(TargetEvent::ALL, TargetEvent::token));

pub static TARGET_STATES: LazyLock<EnumTable<TargetState>> =
    LazyLock::new(|| EnumTable::from_variants(TargetState::ALL, TargetState::token));

pub static TARGET_RESET_MODES: LazyLock<EnumTable<TargetResetMode>> =
    LazyLock::new(|| EnumTable::from_variants(TargetResetMode::ALL, TargetResetMode::token));

/// A recognized unsolicited notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    Event(TargetEvent),
    State(TargetState),
    Reset(TargetResetMode),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Event(e) => write!(f, "{}{}", NotificationKind::Event.prefix(), e),
            Notification::State(s) => write!(f, "{}{}", NotificationKind::State.prefix(), s),
            Notification::Reset(r) => write!(f, "{}{}", NotificationKind::Reset.prefix(), r),
        }
    }
}

/// Which notification prefix a frame carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Event,
    State,
    Reset,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 3] = [
        NotificationKind::Event,
        NotificationKind::State,
        NotificationKind::Reset,
    ];

    /// Frame prefix, including the separating space
    pub fn prefix(self) -> &'static str {
        match self {
            NotificationKind::Event => "#EVENT ",
            NotificationKind::State => "#STATE ",
            NotificationKind::Reset => "#RESET ",
        }
    }

    fn resolve(self, token: &str) -> Option<Notification> {
        match self {
            NotificationKind::Event => TARGET_EVENTS.lookup(token).map(Notification::Event),
            NotificationKind::State => TARGET_STATES.lookup(token).map(Notification::State),
            NotificationKind::Reset => TARGET_RESET_MODES.lookup(token).map(Notification::Reset),
        }
    }
}

/// Classification of one decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Plain response to the pending command
    Response(String),
    /// Notification with a known token
    Notification(Notification),
    /// Notification prefix with a token missing from its table
    ///
    /// Never satisfies a pending command and is never dispatched.
    Unrecognized { kind: NotificationKind, token: String },
}

impl Frame {
    pub fn is_response(&self) -> bool {
        matches!(self, Frame::Response(_))
    }
}

/// Classify a decoded frame by its prefix
pub fn classify(frame: String) -> Frame {
    for kind in NotificationKind::ALL {
        if let Some(rest) = frame.strip_prefix(kind.prefix()) {
            let token = rest.trim();
            return match kind.resolve(token) {
                Some(notification) => Frame::Notification(notification),
                None => Frame::Unrecognized {
                    kind,
                    token: token.to_string(),
                },
            };
        }
    }
    Frame::Response(frame)
}
