//! Text-backed enums.
//!
//! Status and priority columns are stored as snake_case `TEXT` with a
//! `CHECK` constraint. Row structs keep the raw `String`; these enums parse
//! and validate it at the API boundary.

/// Declares a text-backed enum with `as_str`, `ALL`, `Display`, serde
/// snake_case names and a `FromStr` that reports unknown values as
/// validation errors.
#[macro_export]
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($label:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
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
            type Err = $crate::core::shared::error::ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::core::shared::error::ApiError::validation(format!(
                        "Invalid {} '{}'. Expected one of: {}",
                        $label,
                        other,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

text_enum! {
    /// Shared by service jobs and tasks.
    #[derive(Default)]
    pub enum Priority("priority") {
        Low => "low",
        #[default]
        Normal => "normal",
        High => "high",
        Urgent => "urgent",
    }
}

impl Priority {
    /// Sort weight, higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Normal => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

/// Orders rows by urgency on a table with a `priority` column.
pub fn priority_rank() -> diesel::expression::SqlLiteral<diesel::sql_types::Integer> {
    diesel::dsl::sql::<diesel::sql_types::Integer>(
        "CASE priority WHEN 'low' THEN 0 WHEN 'normal' THEN 1 WHEN 'high' THEN 2 ELSE 3 END",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_and_display() {
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
        assert_eq!(Priority::High.to_string(), "high");
        assert_eq!(Priority::default(), Priority::Normal);
        assert!(Priority::Urgent.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_unknown_priority_lists_choices() {
        let err = "critical".parse::<Priority>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Invalid priority 'critical'"));
        assert!(msg.contains("low, normal, high, urgent"));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Priority::Low).unwrap(), "\"low\"");
    }
}
