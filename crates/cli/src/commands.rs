use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the sync manager and run continuously until shutdown.
    Run {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Optional .env file to load before TMPDIR resolution")]
        env_file: Option<String>,
    },
    /// Run one full-refresh batch cycle per table (optionally a single
    /// table) and exit.
    Batch {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Restrict the cycle to a single target table")]
        table: Option<String>,

        #[arg(long, help = "Optional .env file to load before TMPDIR resolution")]
        env_file: Option<String>,
    },
    /// Run one refresh-recent cycle for every refresh-recent-enabled
    /// table and exit.
    RefreshRecent {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Optional .env file to load before TMPDIR resolution")]
        env_file: Option<String>,
    },
    /// Ping a single connection string before wiring it into a config.
    TestConn {
        /// Engine the connection string targets: "mysql" or "postgres".
        #[arg(long)]
        engine: String,

        #[arg(long)]
        conn_str: String,
    },
    /// Print the sync metadata tracked for every target table.
    Status {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
}
