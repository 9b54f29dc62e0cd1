//! Bitmask types shared by spells, results and proc triggers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

macro_rules! bitmask {
    (
        $(#[$meta:meta])*
        $name:ident($repr:ty) {
            $($(#[$flag_meta:meta])* $flag:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            pub const EMPTY: $name = $name(0);
            $($(#[$flag_meta])* pub const $flag: $name = $name($value);)+

            const NAMED: &'static [(&'static str, $name)] = &[$((stringify!($flag), $name::$flag)),+];

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True if any flag of `other` is set.
            pub const fn matches(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            /// True if every flag of `other` is set.
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }

        impl BitAnd for $name {
            type Output = $name;

            fn bitand(self, rhs: $name) -> $name {
                $name(self.0 & rhs.0)
            }
        }

        impl Not for $name {
            type Output = $name;

            fn not(self) -> $name {
                $name(!self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let names: Vec<&str> = $name::NAMED
                    .iter()
                    .filter(|(_, flag)| flag.0.count_ones() == 1 && self.contains(*flag))
                    .map(|(name, _)| *name)
                    .collect();
                if names.is_empty() {
                    f.write_str("EMPTY")
                } else {
                    f.write_str(&names.join("|"))
                }
            }
        }
    };
}

bitmask! {
    /// Classifies what kind of attack or spell produced an event.
    ProcMask(u32) {
        MELEE_MH_AUTO = 1 << 0,
        MELEE_OH_AUTO = 1 << 1,
        MELEE_MH_SPECIAL = 1 << 2,
        MELEE_OH_SPECIAL = 1 << 3,
        RANGED_AUTO = 1 << 4,
        RANGED_SPECIAL = 1 << 5,
        SPELL_DAMAGE = 1 << 6,
        SPELL_HEALING = 1 << 7,
        /// Spells cast by a proc.
        PROC = 1 << 8,
        /// Weapon enchant or item procs.
        WEAPON_PROC = 1 << 9,

        MELEE_MH = (1 << 0) | (1 << 2),
        MELEE_OH = (1 << 1) | (1 << 3),
        MELEE = (1 << 0) | (1 << 1) | (1 << 2) | (1 << 3),
        MELEE_AUTO = (1 << 0) | (1 << 1),
        MELEE_SPECIAL = (1 << 2) | (1 << 3),
        RANGED = (1 << 4) | (1 << 5),
        WHITE_HIT = (1 << 0) | (1 << 1) | (1 << 4),
        MELEE_OR_RANGED = (1 << 0) | (1 << 1) | (1 << 2) | (1 << 3) | (1 << 4) | (1 << 5),
        SPELL_OR_PROC = (1 << 6) | (1 << 8),
    }
}

bitmask! {
    /// Classification of one resolved attempt.
    HitOutcome(u16) {
        MISS = 1 << 0,
        HIT = 1 << 1,
        DODGE = 1 << 2,
        GLANCE = 1 << 3,
        PARRY = 1 << 4,
        BLOCK = 1 << 5,
        CRIT = 1 << 6,
        PARTIAL_1_4 = 1 << 7,
        PARTIAL_2_4 = 1 << 8,
        PARTIAL_3_4 = 1 << 9,

        PARTIAL = (1 << 7) | (1 << 8) | (1 << 9),
        /// Outcomes where the attack connected.
        LANDED = (1 << 1) | (1 << 3) | (1 << 5) | (1 << 6),
        /// Outcomes where the attack was avoided entirely.
        AVOIDED = (1 << 0) | (1 << 2) | (1 << 4),
    }
}

impl HitOutcome {
    pub fn landed(self) -> bool {
        self.matches(HitOutcome::LANDED)
    }

    pub fn is_crit(self) -> bool {
        self.matches(HitOutcome::CRIT)
    }
}

bitmask! {
    /// Per-spell behavior switches.
    SpellFlags(u32) {
        /// Skip partial resists and armor.
        IGNORE_RESISTS = 1 << 0,
        IGNORE_ATTACKER_MODIFIERS = 1 << 1,
        IGNORE_TARGET_MODIFIERS = 1 << 2,
        /// Magic spell that can only fully hit or fully miss.
        BINARY = 1 << 3,
        /// Beneficial spell; healing steps target allies.
        HELPFUL = 1 << 4,
        NO_ON_CAST_COMPLETE = 1 << 5,
        NO_ON_DAMAGE_DEALT = 1 << 6,
        /// Cast time does not trigger the GCD.
        CAST_TIME_NO_GCD = 1 << 7,
        /// Can be used while another spell is being hardcast.
        CAST_WHILE_CASTING = 1 << 8,
        /// Cast time is not reduced by haste.
        IGNORE_HASTE = 1 << 9,
        /// Never triggers procs on anything.
        SUPPRESS_PROCS = 1 << 10,
        NO_METRICS = 1 << 11,
        /// Cost is waived when the cast is free (e.g. clearcasting).
        NO_COST = 1 << 12,
    }
}

bitmask! {
    /// Event classes an aura or proc trigger can listen to.
    EventMask(u16) {
        SPELL_HIT_DEALT = 1 << 0,
        SPELL_HIT_TAKEN = 1 << 1,
        HEAL_DEALT = 1 << 2,
        HEAL_TAKEN = 1 << 3,
        PERIODIC_DAMAGE_DEALT = 1 << 4,
        PERIODIC_HEAL_DEALT = 1 << 5,
        CAST_COMPLETE = 1 << 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_masks() {
        assert!(ProcMask::MELEE.matches(ProcMask::MELEE_MH_AUTO));
        assert!(ProcMask::MELEE.matches(ProcMask::MELEE_OH_SPECIAL));
        assert!(!ProcMask::MELEE.matches(ProcMask::RANGED_AUTO));
        assert!(ProcMask::WHITE_HIT.contains(ProcMask::RANGED_AUTO));
        assert!(!ProcMask::EMPTY.matches(ProcMask::MELEE));
    }

    #[test]
    fn test_outcome_landed() {
        assert!(HitOutcome::HIT.landed());
        assert!((HitOutcome::CRIT | HitOutcome::PARTIAL_1_4).landed());
        assert!(HitOutcome::GLANCE.landed());
        assert!(!HitOutcome::MISS.landed());
        assert!(!HitOutcome::DODGE.landed());
        assert!(!HitOutcome::PARRY.landed());
    }

    #[test]
    fn test_display_lists_single_bits() {
        assert_eq!(HitOutcome::CRIT.to_string(), "CRIT");
        assert_eq!((HitOutcome::HIT | HitOutcome::PARTIAL_2_4).to_string(), "HIT|PARTIAL_2_4");
        assert_eq!(HitOutcome::EMPTY.to_string(), "EMPTY");
        assert_eq!(format!("{:?}", SpellFlags::BINARY), "SpellFlags(BINARY)");
    }

    #[test]
    fn test_not_and_and() {
        let flags = SpellFlags::HELPFUL | SpellFlags::BINARY;
        let without = flags & !SpellFlags::BINARY;
        assert_eq!(without, SpellFlags::HELPFUL);
    }
}
