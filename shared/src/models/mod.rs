//! Domain models and rules for the SCM back office

/// Declares a snake_case string enumeration with `as_str`, `Display`,
/// `FromStr` and `TryFrom<String>` so values round-trip through VARCHAR
/// columns and JSON alike.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::DomainError::validation(
                        stringify!($name),
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = crate::error::DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

mod accounting;
mod inventory;
mod notification;
mod procurement;
mod project;
mod quality;
mod request;

pub use accounting::*;
pub use inventory::*;
pub use notification::*;
pub use procurement::*;
pub use project::*;
pub use quality::*;
pub use request::*;
