use rand::seq::SliceRandom;
use rand::Rng;

const SYMBOLS: [char; 7] = ['✨', '🎉', '⭐', '💫', '🌟', '✓', '🎊'];
const CHEERS: [&str; 6] = ["MATCH!", "NICE!", "SPOT ON!", "GREAT!", "YES!", "BRAVO!"];

/// Confetti particle in terminal cell space
#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub symbol: char,
    pub color_index: usize,
    pub age: f64,
    pub max_age: f64,
}

impl Particle {
    fn burst_from(x: f64, y: f64, rng: &mut impl Rng) -> Self {
        Self {
            x,
            y,
            vel_x: rng.gen_range(-6.0..6.0),
            vel_y: rng.gen_range(-8.0..-2.0),
            symbol: *SYMBOLS.choose(rng).unwrap_or(&'✨'),
            color_index: rng.gen_range(0..7),
            age: 0.0,
            max_age: rng.gen_range(1.0..2.0),
        }
    }

    fn update(&mut self, dt: f64) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.vel_y += 15.0 * dt;
        self.age += dt;
        self.age < self.max_age
    }
}

/// Short burst of confetti with a cheer, played on every hit.
#[derive(Debug)]
pub struct Confetti {
    pub particles: Vec<Particle>,
    pub cheer: Option<&'static str>,
    pub cheer_at: (f64, f64),
    remaining: f64,
    width: f64,
    height: f64,
}

impl Confetti {
    /// Seconds a burst stays on screen.
    pub const DURATION: f64 = 2.0;

    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            cheer: None,
            cheer_at: (0.0, 0.0),
            remaining: 0.0,
            width: 80.0,
            height: 24.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    /// Bursts from `(x, y)` inside a `width` x `height` area.
    pub fn burst(&mut self, x: f64, y: f64, width: u16, height: u16) {
        let mut rng = rand::thread_rng();
        self.width = width as f64;
        self.height = height as f64;
        self.remaining = Self::DURATION;
        self.cheer = CHEERS.choose(&mut rng).copied();
        self.cheer_at = (x, y);
        self.particles = (0..30).map(|_| Particle::burst_from(x, y, &mut rng)).collect();
    }

    pub fn update(&mut self, dt: f64) {
        if !self.is_active() {
            return;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining = 0.0;
            self.particles.clear();
            self.cheer = None;
            return;
        }

        let (w, h) = (self.width, self.height);
        self.particles.retain_mut(|p| {
            let alive = p.update(dt);
            let on_screen = p.x >= 0.0 && p.x < w && p.y >= 0.0 && p.y < h;
            alive && on_screen
        });
    }
}

impl Default for Confetti {
    fn default() -> Self {
        Self::new()
    }
}
