//! Mirror selection by provider preference.

use tracing::debug;

use super::classifier::Mirror;

/// Providers in the order we prefer them.
pub const DEFAULT_PREFERENCE: &[&str] = &[
    "TeliaSonera",
    "Cogent",
    "GlobalCrossing",
    "Teleglobe",
    "Deutsche Telekom",
    "TeliaSonera #2",
    "GlobalCrossing #2",
    "Cogent #2",
    "Level(3)",
    "Level(3) #2",
    "Level(3) #3",
    "Level(3) #4",
];

/// Picks one mirror out of the candidates offered on the ticket page.
#[derive(Debug, Clone)]
pub struct ServerSelector {
    preference: Vec<String>,
}

impl Default for ServerSelector {
    fn default() -> Self {
        Self::new(DEFAULT_PREFERENCE.iter().copied())
    }
}

impl ServerSelector {
    /// Creates a selector with a custom priority list (highest first).
    pub fn new<I, S>(preference: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            preference: preference.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the first candidate matching the highest-ranked provider name,
    /// or the first candidate in page order when no name matches.
    ///
    /// Returns `None` only for an empty candidate list.
    #[must_use]
    pub fn select<'a>(&self, candidates: &'a [Mirror]) -> Option<&'a Mirror> {
        for wanted in &self.preference {
            if let Some(found) = candidates.iter().find(|m| &m.name == wanted) {
                debug!(server = %found.name, "selected preferred server");
                return Some(found);
            }
            debug!(server = %wanted, "preferred server not offered");
        }

        let fallback = candidates.first()?;
        debug!(server = %fallback.name, "no preferred server offered, using first candidate");
        Some(fallback)
    }
}
