use clap::{Args, ValueEnum};
use gemaudit_core::{Config, Scanner};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct Check {
    /// Project directory containing the lockfile
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Lockfile name, relative to DIR
    #[arg(long, value_name = "NAME", default_value = "Gemfile.lock")]
    gemfile_lock: String,

    /// Advisory database directory (one sub-directory per gem)
    #[arg(long, value_name = "PATH", env = "GEMAUDIT_DATABASE")]
    database: Option<PathBuf>,

    /// Advisory identifiers to ignore
    #[arg(short, long, value_name = "ID", value_delimiter = ',')]
    ignore: Vec<String>,

    /// Treat versions as patched for an advisory, as ID@REQUIREMENT
    #[arg(long, value_name = "ID@REQ")]
    safe: Vec<String>,

    /// Do not report git:// sources
    #[arg(long)]
    consider_git_uris_safe: bool,

    /// Print advisory descriptions instead of titles
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not print the summary line when nothing is found
    #[arg(short, long)]
    quiet: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

impl Check {
    /// Returns whether anything was found.
    pub fn run(&self) -> anyhow::Result<bool> {
        let dir = self.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        if !dir.is_dir() {
            anyhow::bail!("Project directory does not exist: {}", dir.display());
        }

        let config = Config::load(&dir)?.merge(
            self.ignore.clone(),
            self.safe.clone(),
            self.consider_git_uris_safe,
        );

        let database = super::scan::open_database(self.database.as_deref(), &config.safe_versions)?;
        let lockfile = super::scan::load_lockfile(&dir, &self.gemfile_lock)?;

        let scanner = Scanner::new(&database, lockfile)
            .with_ignore(config.ignore.iter().cloned())
            .consider_git_uris_safe(config.consider_git_uris_safe);

        match self.format {
            Format::Json => {
                let report = scanner.report();
                println!("{}", super::display::print_json(&report)?);
                Ok(report.has_vulnerabilities())
            }
            Format::Text => {
                let mut found = false;
                for result in scanner.scan() {
                    found = true;
                    print!("{}", super::display::format_result(&result, self.verbose));
                }
                if found || !self.quiet {
                    println!("{}", super::display::format_summary(found));
                }
                Ok(found)
            }
        }
    }
}

#[derive(Args, Debug)]
pub struct Version {
    /// Advisory database directory
    #[arg(long, value_name = "PATH", env = "GEMAUDIT_DATABASE")]
    database: Option<PathBuf>,
}

impl Version {
    pub fn run(&self) -> anyhow::Result<()> {
        let database = super::scan::open_database(self.database.as_deref(), &[])?;
        println!(
            "gemaudit {} (advisories: {})",
            env!("CARGO_PKG_VERSION"),
            database.size()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct Stats {
    /// Advisory database directory
    #[arg(long, value_name = "PATH", env = "GEMAUDIT_DATABASE")]
    database: Option<PathBuf>,

    /// Number of gems to list
    #[arg(long, default_value_t = 10)]
    top: usize,
}

impl Stats {
    pub fn run(&self) -> anyhow::Result<()> {
        let database = super::scan::open_database(self.database.as_deref(), &[])?;

        let counts: Vec<(String, usize)> = database
            .gems()
            .into_iter()
            .map(|gem| {
                let count = database.size_for(&gem);
                (gem, count)
            })
            .collect();

        let total = database.size();
        print!("{}", super::display::format_stats(counts, self.top, total));
        Ok(())
    }
}
