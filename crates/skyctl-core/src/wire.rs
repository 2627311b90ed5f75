// ── Wire value tables ──
//
// Protocol enums travel as small integers, multi-value capabilities as
// bitfields where bit `n` stands for the variant whose wire value is `n`.
// `wire_enum!` turns one declarative table into the domain enum plus both
// conversions, so no lookup is ever hand-written.

/// Declares a domain enum together with its wire table.
///
/// The first variant is the `Default`. Variant declaration order is the
/// iteration order of `BTreeSet`s of the enum, which is what fallback
/// validation picks from.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(#[$first_meta:meta])*
            $first:ident = $first_wire:literal
            $(, $(#[$variant_meta:meta])* $variant:ident = $wire:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            ::serde::Serialize, ::serde::Deserialize, ::strum::EnumIter, ::strum::Display,
        )]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        $vis enum $name {
            $(#[$first_meta])*
            $first,
            $($(#[$variant_meta])* $variant,)*
        }

        impl $name {
            /// Wire value of this variant.
            pub const fn to_wire(self) -> u32 {
                match self {
                    Self::$first => $first_wire,
                    $(Self::$variant => $wire,)*
                }
            }

            /// Decodes a wire value, `None` if the value is unknown.
            pub const fn from_wire(value: u32) -> Option<Self> {
                match value {
                    $first_wire => Some(Self::$first),
                    $($wire => Some(Self::$variant),)*
                    _ => None,
                }
            }

            /// Decodes a capability bitfield. Unknown bits are ignored.
            pub fn from_bitfield(bits: u64) -> ::std::collections::BTreeSet<Self> {
                <Self as ::strum::IntoEnumIterator>::iter()
                    .filter(|value| {
                        let bit = value.to_wire();
                        bit < 64 && bits & (1u64 << bit) != 0
                    })
                    .collect()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Generic on/off state field.
    pub enum SwitchState {
        Inactive = 0,
        Active = 1,
    }
}

wire_enum! {
    /// Generic availability field.
    pub enum Availability {
        NotAvailable = 0,
        Available = 1,
    }
}

wire_enum! {
    /// Generic support flag carried by capability events.
    pub enum Supported {
        NotSupported = 0,
        Supported = 1,
    }
}

impl SwitchState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl Availability {
    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}

impl Supported {
    pub fn is_supported(self) -> bool {
        self == Self::Supported
    }
}
