use std::time::{Duration, Instant};

use crate::models::storage::{LocalStore, BANNER_SEEN_KEY};

const ROTATION: Duration = Duration::from_secs(4);

pub const WELCOME_MESSAGES: [&str; 5] = [
    "¡Bienvenido a BRUTAL24! 🔥 Donde tus pensamientos viven rápido y mueren jóvenes",
    "¡La red social más HONESTA del universo! Sin filtros, sin mentiras, solo 24 horas de verdad",
    "¡Aquí puedes ser TÚ MISMO sin consecuencias! Todo desaparece como por arte de magia ✨",
    "¡BRUTAL24: Donde la autenticidad es KING y la falsedad está PROHIBIDA! 👑",
    "¡Comparte, conecta, desaparece! La fórmula perfecta para la libertad digital 🚀",
];

/// First-run banner, shown until dismissed once.
pub struct WelcomeBanner {
    visible: bool,
    current: usize,
    rotated_at: Instant,
}

impl WelcomeBanner {
    pub fn load(store: &LocalStore, now: Instant) -> Self {
        let seen = store.load::<bool>(BANNER_SEEN_KEY).unwrap_or(false);
        Self {
            visible: !seen,
            current: 0,
            rotated_at: now,
        }
    }

    pub fn tick(&mut self, now: Instant) {
        if !self.visible {
            return;
        }
        while now.duration_since(self.rotated_at) >= ROTATION {
            self.current = (self.current + 1) % WELCOME_MESSAGES.len();
            self.rotated_at += ROTATION;
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        self.visible.then(|| WELCOME_MESSAGES[self.current])
    }

    pub fn dismiss(&mut self, store: &LocalStore) {
        self.visible = false;
        if let Err(e) = store.save(BANNER_SEEN_KEY, &true) {
            log::warn!("Failed to remember banner dismissal: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_and_stays_dismissed() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        let start = Instant::now();

        let mut banner = WelcomeBanner::load(&store, start);
        assert_eq!(banner.message(), Some(WELCOME_MESSAGES[0]));
        banner.tick(start + Duration::from_secs(9));
        assert_eq!(banner.message(), Some(WELCOME_MESSAGES[2]));

        banner.dismiss(&store);
        assert_eq!(banner.message(), None);
        assert_eq!(WelcomeBanner::load(&store, start).message(), None);
    }
}
