//! Identity types.
//!
//! All of these are opaque strings minted elsewhere: user ids by the
//! upstream authentication layer, session ids and introduction tokens
//! by an [crate::id_gen::IdGenerator], fingerprint hashes by clients.

macro_rules! imp_deref {
    ($i:ty, $t:ty) => {
        impl std::ops::Deref for $i {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! imp_from {
    ($a:ty, $b:ty, $i:ident => $e:expr) => {
        impl From<$b> for $a {
            fn from($i: $b) -> Self {
                $e
            }
        }
    };
}

macro_rules! imp_str_id {
    ($(#[$m:meta])* $i:ident) => {
        $(#[$m])*
        #[derive(
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $i(pub std::sync::Arc<str>);

        imp_deref!($i, str);
        imp_from!($i, &str, s => $i(s.into()));
        imp_from!($i, String, s => $i(s.into_boxed_str().into()));

        impl std::fmt::Display for $i {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl std::fmt::Debug for $i {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

imp_str_id!(
    /// Identifies a participant. Supplied by the pre-authenticated caller.
    UserId
);

imp_str_id!(
    /// Identifies an ephemeral multi-party session.
    SessionId
);

imp_str_id!(
    /// An opaque fingerprint hash standing in for a real identity.
    FingerprintHash
);

imp_str_id!(
    /// Identifies a group that owns a visibility schedule.
    GroupId
);

/// An unguessable introduction token.
///
/// Debug output is redacted so tokens don't leak into logs.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct IntroToken(pub std::sync::Arc<str>);

imp_deref!(IntroToken, str);
imp_from!(IntroToken, &str, s => IntroToken(s.into()));
imp_from!(IntroToken, String, s => IntroToken(s.into_boxed_str().into()));

impl std::fmt::Display for IntroToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for IntroToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IntroToken(<{} chars>)", self.0.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_display_as_plain_strings() {
        let u = UserId::from("ABC123");
        assert_eq!("ABC123", u.to_string());
        assert_eq!("ABC123", format!("{u:?}"));
        assert_eq!("\"ABC123\"", serde_json::to_string(&u).unwrap());
    }

    #[test]
    fn token_debug_is_redacted() {
        let t = IntroToken::from("supersecret");
        assert_eq!("IntroToken(<11 chars>)", format!("{t:?}"));
        assert_eq!("supersecret", t.to_string());
    }
}
