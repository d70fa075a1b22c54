use std::fmt;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(TaskId);
id_type!(EdgeId);
id_type!(CoreId);
id_type!(NiId);
id_type!(AppIdx);

/// Conventional id for a single application's head/entrance task in test
/// and example task graphs. Head-ness itself is structural
/// (`GraphTask::is_head`, i.e. no incoming edges) since a shared arena
/// holding several applications cannot give every one of their head
/// tasks the same global id.
pub const HEAD_TASK_ID: TaskId = TaskId(0);
