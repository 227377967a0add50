use anyhow::Context;

const DEFAULT_PORT: u16 = 4221;
const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Which concurrency strategy serves the connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Fixed-size worker pool with a bounded queue (admission control)
    Fixed,
    /// Cached pool: grows on demand, idle workers expire
    Cached,
    /// One thread per accepted connection
    Spawn,
    /// Single-threaded event loop
    Reactive,
}

impl Mode {
    fn from_arg(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(Mode::Fixed),
            "cached" => Some(Mode::Cached),
            "spawn" => Some(Mode::Spawn),
            "reactive" => Some(Mode::Reactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub host: String,
    pub port: u16,
    /// Worker count for the fixed pool
    pub workers: usize,
    /// Queue depth for the fixed pool; a full queue rejects with 503
    pub queue_depth: usize,
}

impl Config {
    /// Loads configuration from `triserve <mode> [port]` plus environment
    /// overrides (`HOST`, `WORKERS`, `QUEUE_DEPTH`).
    pub fn load() -> anyhow::Result<Self> {
        Self::from_args(std::env::args().skip(1))
    }

    pub fn from_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mode_arg = args
            .next()
            .context("usage: triserve <fixed|cached|spawn|reactive> [port]")?;
        let mode = Mode::from_arg(&mode_arg)
            .with_context(|| format!("unknown server mode: {mode_arg}"))?;

        let port = match args.next() {
            Some(arg) => arg
                .parse()
                .with_context(|| format!("invalid port: {arg}"))?,
            None => DEFAULT_PORT,
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let workers = match std::env::var("WORKERS") {
            Ok(v) => v.parse().context("WORKERS must be a number")?,
            Err(_) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        };

        let queue_depth = match std::env::var("QUEUE_DEPTH") {
            Ok(v) => v.parse().context("QUEUE_DEPTH must be a number")?,
            Err(_) => DEFAULT_QUEUE_DEPTH,
        };

        Ok(Self {
            mode,
            host,
            port,
            workers,
            queue_depth,
        })
    }

    /// The address the listening socket binds.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
