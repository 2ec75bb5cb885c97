//! Typed domain separators for canonical hashing.
//!
//! Every hash computation selects a domain via [`HashDomain`]. Adding a
//! domain is a single entry in the macro invocation below; the enum,
//! `as_bytes()`, `ALL`, and `Display` are generated from it.

/// Declares `HashDomain` enum, `as_bytes()`, `ALL`, and `Display` from one list.
macro_rules! define_hash_domains {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident => $bytes:expr
        ),+ $(,)?
    ) => {
        /// Typed domain separator for [`super::hash::canonical_hash`].
        ///
        /// Every variant maps to a unique, null-terminated byte string used as
        /// a SHA-256 prefix.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HashDomain {
            $(
                $(#[$meta])*
                $variant,
            )+
        }

        impl HashDomain {
            /// The raw domain-separator bytes (null-terminated).
            #[must_use]
            pub const fn as_bytes(&self) -> &'static [u8] {
                match self {
                    $( Self::$variant => $bytes, )+
                }
            }

            /// All domain variants in declaration order.
            pub const ALL: &[HashDomain] = &[
                $( Self::$variant, )+
            ];
        }

        impl core::fmt::Display for HashDomain {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $( Self::$variant => write!(f, stringify!($variant)), )+
                }
            }
        }
    };
}

define_hash_domains! {
    // -----------------------------------------------------------------------
    // Staircase
    // -----------------------------------------------------------------------

    /// Staircase policy snapshot.
    PolicySnapshot => b"ULI::STAIRCASE_POLICY::V1\0",

    /// Stimulus set (sorted token array).
    StimulusSet => b"ULI::STIMULUS_SET::V1\0",

    /// Trial tape chain seed (header record).
    TrialTape => b"ULI::TRIAL_TAPE::V1\0",

    /// Trial tape chain step (trial and footer records).
    TrialTapeChain => b"ULI::TRIAL_TAPE_CHAIN::V1\0",

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    /// Session bundle artifact content.
    BundleArtifact => b"ULI::BUNDLE_ARTIFACT::V1\0",

    /// Session bundle digest (normative projection).
    BundleDigest => b"ULI::BUNDLE_DIGEST::V1\0",
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn all_variants_in_all_constant() {
        assert_eq!(HashDomain::ALL.len(), 6, "expected 6 domain variants in ALL");
    }

    #[test]
    fn all_bytes_unique() {
        let mut seen = BTreeSet::new();
        for domain in HashDomain::ALL {
            assert!(
                seen.insert(domain.as_bytes()),
                "duplicate domain bytes: {domain}"
            );
        }
    }

    #[test]
    fn all_follow_naming_convention() {
        for domain in HashDomain::ALL {
            let bytes = domain.as_bytes();
            assert!(bytes.starts_with(b"ULI::"), "{domain} does not start with ULI::");
            assert!(bytes.ends_with(b"::V1\0"), "{domain} does not end with ::V1\\0");
        }
    }

    #[test]
    fn display_returns_variant_name() {
        assert_eq!(HashDomain::TrialTapeChain.to_string(), "TrialTapeChain");
        assert_eq!(HashDomain::BundleDigest.to_string(), "BundleDigest");
    }
}
