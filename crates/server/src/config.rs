//! Runtime configuration: library knobs (`ProgressionConfig`) and the
//! binary's command-line flags (`ServerConfig`).

use std::path::PathBuf;
use std::time::Duration;

/// Vertical extent walls are built over, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldHeight {
    pub min_y: i64,
    pub max_y: i64,
}

impl WorldHeight {
    /// MC 1.21 overworld: y = -64 ..= 319.
    pub const OVERWORLD: WorldHeight = WorldHeight {
        min_y: -64,
        max_y: 319,
    };

    pub const fn new(min_y: i64, max_y: i64) -> Self {
        Self { min_y, max_y }
    }

    pub fn ys(&self) -> std::ops::RangeInclusive<i64> {
        self.min_y..=self.max_y
    }

    pub fn contains(&self, y: i64) -> bool {
        self.ys().contains(&y)
    }

    /// Number of block layers.
    pub fn len(&self) -> usize {
        (self.max_y - self.min_y + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorldHeight {
    fn default() -> Self {
        Self::OVERWORLD
    }
}

/// Knobs for the progression core.
#[derive(Debug, Clone)]
pub struct ProgressionConfig {
    pub height: WorldHeight,
    /// When set, `try_unlock` refuses chunks that are not adjacent to the
    /// unlocked set (except the very first unlock).
    pub strict_adjacency: bool,
    /// Max wall cells written per batch.
    pub batch_size: usize,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            height: WorldHeight::OVERWORLD,
            strict_adjacency: false,
            batch_size: crate::border::batch::MAX_BATCH_SIZE,
        }
    }
}

/// Default autosave interval (5 minutes).
const DEFAULT_AUTOSAVE: Duration = Duration::from_secs(300);

/// Flags for the `chunklock-server` binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub world_dir: PathBuf,
    pub demo: bool,
    pub strict_adjacency: bool,
    pub autosave_interval: Duration,
    /// Radius (in chunks) of the flat world generated around the origin.
    pub generate_radius: i32,
}

impl ServerConfig {
    /// Parse `--world <dir>`, `--demo`, `--strict-adjacency`,
    /// `--autosave-secs <n>` and `--radius <n>`. Unknown flags are ignored;
    /// unparsable values fall back to defaults.
    pub fn from_args(args: &[String]) -> Self {
        let value_of = |flag: &str| -> Option<&String> {
            args.iter().skip_while(|a| a.as_str() != flag).nth(1)
        };

        Self {
            world_dir: value_of("--world")
                .map(PathBuf::from)
                .unwrap_or_else(|| "world".into()),
            demo: args.iter().any(|a| a == "--demo"),
            strict_adjacency: args.iter().any(|a| a == "--strict-adjacency"),
            autosave_interval: value_of("--autosave-secs")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_AUTOSAVE),
            generate_radius: value_of("--radius")
                .and_then(|s| s.parse().ok())
                .unwrap_or(8),
        }
    }

    pub fn progression(&self) -> ProgressionConfig {
        ProgressionConfig {
            strict_adjacency: self.strict_adjacency,
            ..ProgressionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_flags() {
        let cfg = ServerConfig::from_args(&args(&["chunklock-server"]));
        assert_eq!(cfg.world_dir, PathBuf::from("world"));
        assert!(!cfg.demo);
        assert!(!cfg.strict_adjacency);
        assert_eq!(cfg.autosave_interval, DEFAULT_AUTOSAVE);
    }

    #[test]
    fn flags_are_picked_up() {
        let cfg = ServerConfig::from_args(&args(&[
            "chunklock-server",
            "--world",
            "saves/alpha",
            "--strict-adjacency",
            "--autosave-secs",
            "30",
            "--radius",
            "3",
        ]));
        assert_eq!(cfg.world_dir, PathBuf::from("saves/alpha"));
        assert!(cfg.strict_adjacency);
        assert!(cfg.progression().strict_adjacency);
        assert_eq!(cfg.autosave_interval, Duration::from_secs(30));
        assert_eq!(cfg.generate_radius, 3);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let cfg = ServerConfig::from_args(&args(&["x", "--autosave-secs", "soon"]));
        assert_eq!(cfg.autosave_interval, DEFAULT_AUTOSAVE);
    }

    #[test]
    fn overworld_height() {
        assert_eq!(WorldHeight::OVERWORLD.len(), 384);
        assert!(WorldHeight::OVERWORLD.contains(-64));
        assert!(!WorldHeight::OVERWORLD.contains(320));
    }
}
