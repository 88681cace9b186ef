use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(
    /// Assessment phase. Only ever moves forward.
    Phase {
        Fixed => "fixed",
        Dynamic => "dynamic",
        Summarizing => "summarizing",
        Done => "done",
    }
);

str_enum!(
    /// Where an answered event came from.
    QuestionSource {
        Complaint => "complaint",
        Fixed => "fixed",
        Dynamic => "dynamic",
    }
);

str_enum!(
    /// Canonical department tag used for hospital routing.
    Specialty {
        Cardiology => "cardiology",
        Neurology => "neurology",
        Orthopedics => "orthopedics",
        Gastroenterology => "gastroenterology",
        Dermatology => "dermatology",
        Ophthalmology => "ophthalmology",
        Ent => "ent",
        Pulmonology => "pulmonology",
        Endocrinology => "endocrinology",
        Urology => "urology",
        Gynecology => "gynecology",
        Pediatrics => "pediatrics",
        Emergency => "emergency",
        Internal => "internal",
    }
);

impl Phase {
    /// Position in the forward-only phase order.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::Fixed => 0,
            Self::Dynamic => 1,
            Self::Summarizing => 2,
            Self::Done => 3,
        }
    }
}

impl Specialty {
    pub const ALL: [Specialty; 14] = [
        Self::Cardiology,
        Self::Neurology,
        Self::Orthopedics,
        Self::Gastroenterology,
        Self::Dermatology,
        Self::Ophthalmology,
        Self::Ent,
        Self::Pulmonology,
        Self::Endocrinology,
        Self::Urology,
        Self::Gynecology,
        Self::Pediatrics,
        Self::Emergency,
        Self::Internal,
    ];

    /// Human-readable department name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cardiology => "Cardiology",
            Self::Neurology => "Neurology",
            Self::Orthopedics => "Orthopedics",
            Self::Gastroenterology => "Gastroenterology",
            Self::Dermatology => "Dermatology",
            Self::Ophthalmology => "Ophthalmology",
            Self::Ent => "Ear, Nose & Throat",
            Self::Pulmonology => "Pulmonology",
            Self::Endocrinology => "Endocrinology",
            Self::Urology => "Urology",
            Self::Gynecology => "Gynecology",
            Self::Pediatrics => "Pediatrics",
            Self::Emergency => "Emergency Medicine",
            Self::Internal => "General Medicine",
        }
    }
}
