//! svault: SessionVault command-line interface
//!
//! Commands:
//!   init                      - create the master secret and session index
//!   derive <type> [<index>]   - derive a recipient key and write its key file
//!   encrypt <file>            - seal a file (or `-` for stdin) and register it
//!   decrypt <id>              - open a session to stdout or --output
//!   list / show / tag         - browse and annotate the index
//!   remove / compact          - delete sessions, drop dangling entries
//!   policy show|set           - inspect or change the index policy
//!   backup / restore          - export or reinstate the master secret
//!   regenerate                - replace the master secret (confirmed)
//!   verify                    - integrity and hygiene report
//!   config show               - display current configuration

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use zeroize::Zeroize;

use svault_core::config::expand_tilde;
use svault_core::fsutil;
use svault_core::SvaultConfig;
use svault_keys::{
    check_fingerprint, fingerprint, BackupAcknowledgement, BackupBundle, DestructiveConfirmation,
};
use svault_store::{load_private_key, Recipient, RecordEdit, SessionStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "svault",
    version,
    about = "Encrypted session store with deterministic key derivation",
    long_about = "svault: derive per-session age recipients from one master secret, \
                  seal session files, and keep an index of what was sealed"
)]
struct Cli {
    /// Path to svault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SVAULT_CONFIG",
        default_value = "~/.config/svault/svault.toml",
        global = true
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [logging] level
    #[arg(long, env = "SVAULT_LOG", global = true)]
    log: Option<String>,

    /// Log format (json, text); overrides [logging] format
    #[arg(long, env = "SVAULT_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Scope identifier hashed into the path, e.g. a repository URL
    /// (overrides [scope] identifier)
    #[arg(long, env = "SVAULT_SCOPE")]
    scope: Option<String>,

    /// Purpose segment (overrides [keys] default_purpose)
    #[arg(long)]
    purpose: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the master secret, key directory and session index
    Init,

    /// Derive the recipient key for purpose/scope/type/index and store it
    Derive {
        /// Session type segment (e.g. planning, review)
        session_type: String,
        /// Index segment
        #[arg(default_value_t = 0)]
        index: u32,
        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Encrypt a session file and register it in the index
    ///
    /// The recipient is, in order of preference: --recipient, the key derived
    /// for --type/--index, or [encryption] recipient from the config.
    Encrypt {
        /// Input file, or `-` to read stdin
        input: PathBuf,
        /// Static recipient public key (age1...)
        #[arg(long, conflicts_with = "session_type")]
        recipient: Option<String>,
        /// Derive the recipient for this session type
        #[arg(long = "type", short = 't')]
        session_type: Option<String>,
        /// Index segment for the derived recipient
        #[arg(long, default_value_t = 0)]
        index: u32,
        #[command(flatten)]
        scope: ScopeArgs,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Free-form description stored in the public metadata
        #[arg(long, short = 'd', default_value = "")]
        description: String,
        /// Encrypt even if the input matches a policy content filter
        #[arg(long)]
        force: bool,
    },

    /// Decrypt a session
    ///
    /// Without --identity the private key is re-derived from the master
    /// secret using the derivation path recorded with the session.
    Decrypt {
        session_id: String,
        /// Identity file holding the private key
        #[arg(long, short = 'i')]
        identity: Option<PathBuf>,
        /// Write plaintext here (mode 0600) instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// List sessions, oldest first
    List {
        /// Only sessions carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one session's metadata
    Show { session_id: String },

    /// Edit a session's tags or description
    Tag {
        session_id: String,
        /// Tag to add (repeatable)
        #[arg(long = "add")]
        add: Vec<String>,
        /// Tag to remove (repeatable)
        #[arg(long = "remove")]
        remove: Vec<String>,
        /// Replace the description
        #[arg(long, short = 'd')]
        description: Option<String>,
    },

    /// Delete a session's ciphertext, metadata and index entry
    Remove { session_id: String },

    /// Drop index entries whose ciphertext no longer exists
    Compact,

    /// Index policy management
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Export the master secret (hex + BIP-39 mnemonic) for offline backup
    Backup {
        /// Write the bundle here (mode 0600) instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Skip the interactive acknowledgement
        #[arg(long)]
        yes: bool,
    },

    /// Reinstate the master secret from a backup bundle or mnemonic
    Restore {
        /// Backup bundle JSON written by `svault backup`
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// Expected fingerprint (or prefix) to check the restored secret against
        #[arg(long)]
        fingerprint: Option<String>,
    },

    /// Replace the master secret; previously derived keys are orphaned
    Regenerate {
        /// First 8 characters of the current fingerprint
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Check master secret, ciphertext checksums, orphans, plaintext and key age
    Verify,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyAction {
    /// Print the current policy
    Show,
    /// Change policy fields; unspecified fields are kept
    Set {
        #[arg(long)]
        auto_encrypt: Option<bool>,
        #[arg(long)]
        require_encryption: Option<bool>,
        #[arg(long)]
        key_rotation_days: Option<u32>,
        /// Content filter glob to add (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Remove all content filters before adding --filter values
        #[arg(long)]
        clear_filters: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = load_config(&config_path).await?;

    let level = cli.log.clone().unwrap_or_else(|| config.logging.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| LogFormat::from_str(&config.logging.format, true).unwrap_or(LogFormat::Text));
    init_logging(&level, &format);

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "svault starting"
    );

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        command => {
            let store = SessionStore::open(config).context("opening session store")?;
            run(&store, command, &config_path).await
        }
    }
}

async fn run(store: &SessionStore, command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Init => cmd_init(store),
        Commands::Derive { session_type, index, scope } => {
            cmd_derive(store, &session_type, index, &scope)
        }
        Commands::Encrypt {
            input,
            recipient,
            session_type,
            index,
            scope,
            tags,
            description,
            force,
        } => {
            let target = match (recipient, session_type) {
                (Some(key), _) => Target::Static(key),
                (None, Some(session_type)) => Target::Derived { session_type, index, scope },
                (None, None) => Target::Configured,
            };
            cmd_encrypt(store, &input, target, &tags, &description, force).await
        }
        Commands::Decrypt { session_id, identity, output } => {
            cmd_decrypt(store, &session_id, identity.as_deref(), output.as_deref())
        }
        Commands::List { tag, json } => cmd_list(store, tag.as_deref(), json),
        Commands::Show { session_id } => cmd_show(store, &session_id),
        Commands::Tag { session_id, add, remove, description } => {
            let edit = RecordEdit {
                add_tags: add,
                remove_tags: remove,
                description,
            };
            cmd_tag(store, &session_id, &edit)
        }
        Commands::Remove { session_id } => cmd_remove(store, &session_id),
        Commands::Compact => cmd_compact(store),
        Commands::Policy { action: PolicyAction::Show } => cmd_policy_show(store),
        Commands::Policy {
            action:
                PolicyAction::Set {
                    auto_encrypt,
                    require_encryption,
                    key_rotation_days,
                    filters,
                    clear_filters,
                },
        } => {
            let mut policy = store.index().policy()?;
            if let Some(v) = auto_encrypt {
                policy.auto_encrypt = v;
            }
            if let Some(v) = require_encryption {
                policy.require_encryption = v;
            }
            if let Some(v) = key_rotation_days {
                policy.key_rotation_days = v;
            }
            if clear_filters {
                policy.content_filters.clear();
            }
            for filter in filters {
                if !policy.content_filters.contains(&filter) {
                    policy.content_filters.push(filter);
                }
            }
            store.set_policy(policy).context("updating policy")?;
            cmd_policy_show(store)
        }
        Commands::Backup { output, yes } => cmd_backup(store, output.as_deref(), yes),
        Commands::Restore { bundle, fingerprint } => {
            cmd_restore(store, bundle.as_deref(), fingerprint.as_deref()).await
        }
        Commands::Regenerate { confirm } => cmd_regenerate(store, confirm),
        Commands::Verify => cmd_verify(store),
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(store.config(), config_path)
        }
    }
}

// ── Config loading / logging ──────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<SvaultConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        SvaultConfig::parse(&content, path).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(SvaultConfig::default())
    }
}

/// Logs go to stderr so stdout stays usable for session ids and plaintext.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Read one line from the terminal after printing `message` to stderr.
fn prompt(message: &str) -> Result<String> {
    eprint!("{message}");
    std::io::stderr().flush().context("flushing prompt")?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading answer")?;
    Ok(line.trim().to_string())
}

fn short(fp: &str) -> &str {
    &fp[..16.min(fp.len())]
}

// ── `svault init` ─────────────────────────────────────────────────────────────

fn cmd_init(store: &SessionStore) -> Result<()> {
    let secret = store
        .initialize()
        .with_context(|| format!("initializing {}", store.master().path().display()))?;

    println!("Initialized svault:");
    println!("  master secret: {}", store.master().path().display());
    println!("  fingerprint:   {}", short(&fingerprint(&secret)));
    println!("  keys:          {}", store.keys().dir().display());
    println!("  sessions:      {}", store.sessions_dir().display());
    println!();
    println!("Back up the master secret now: svault backup --output <file>");
    Ok(())
}

// ── `svault derive` ───────────────────────────────────────────────────────────

fn cmd_derive(store: &SessionStore, session_type: &str, index: u32, scope: &ScopeArgs) -> Result<()> {
    let path = store.derivation_path(
        scope.scope.as_deref(),
        scope.purpose.as_deref(),
        session_type,
        index,
    )?;
    let (derived, file) = store
        .derive_key(&path)
        .with_context(|| format!("deriving key for {path}"))?;

    println!("  path:       {path}");
    println!("  algorithm:  {}", derived.algorithm);
    println!("  public key: {}", derived.keypair.public_key);
    println!("  key file:   {}", file.display());
    Ok(())
}

// ── `svault encrypt` ──────────────────────────────────────────────────────────

enum Target {
    Static(String),
    Derived {
        session_type: String,
        index: u32,
        scope: ScopeArgs,
    },
    Configured,
}

async fn cmd_encrypt(
    store: &SessionStore,
    input: &Path,
    target: Target,
    tags: &[String],
    description: &str,
    force: bool,
) -> Result<()> {
    let from_stdin = input == Path::new("-");

    if !from_stdin {
        if let Some(pattern) = store.matching_filter(input)? {
            if !force {
                anyhow::bail!(
                    "{} matches content filter {pattern:?}; refusing to encrypt (use --force to override)",
                    input.display()
                );
            }
            tracing::warn!(
                op = "encrypt",
                input = %input.display(),
                pattern = %pattern,
                "content filter overridden with --force"
            );
        }
    }

    let content = if from_stdin {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("reading stdin")?;
        buf
    } else {
        tokio::fs::read(input)
            .await
            .with_context(|| format!("reading {}", input.display()))?
    };

    let recipient = match target {
        Target::Static(key) => Recipient::static_key(key),
        Target::Derived { session_type, index, scope } => {
            let path = store.derivation_path(
                scope.scope.as_deref(),
                scope.purpose.as_deref(),
                &session_type,
                index,
            )?;
            store
                .recipient(Some(&path))
                .with_context(|| format!("deriving recipient for {path}"))?
        }
        Target::Configured => store.recipient(None)?,
    };

    let record = store
        .encrypt(&content, &recipient, tags, description)
        .context("encrypting session")?;

    println!("{}", record.session_id);
    Ok(())
}

// ── `svault decrypt` ──────────────────────────────────────────────────────────

fn cmd_decrypt(
    store: &SessionStore,
    session_id: &str,
    identity: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let identity = identity
        .map(|p| load_private_key(&expand_tilde(p)))
        .transpose()
        .context("loading identity")?;

    let mut plaintext = store
        .decrypt(session_id, identity.as_ref())
        .with_context(|| format!("decrypting session {session_id}"))?;

    let written = match output {
        Some(path) => fsutil::atomic_write(path, &plaintext, true)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&plaintext)
                .and_then(|_| out.flush())
                .context("writing to stdout")
        }
    };
    plaintext.zeroize();
    written
}

// ── `svault list` / `show` ────────────────────────────────────────────────────

fn cmd_list(store: &SessionStore, tag: Option<&str>, json: bool) -> Result<()> {
    let sessions = match tag {
        Some(tag) => store.index().find_by_tag(tag)?,
        None => store.index().list()?,
    };

    if json {
        let records: Vec<_> = sessions.iter().collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if sessions.is_empty() {
        println!("no sessions");
        return Ok(());
    }

    println!("{:<36}  {:<19}  {:<24}  DESCRIPTION", "SESSION", "CREATED", "TAGS");
    for record in &sessions {
        let tags = record.tags.iter().cloned().collect::<Vec<_>>().join(",");
        println!(
            "{:<36}  {:<19}  {:<24}  {}",
            record.session_id,
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            tags,
            record.description
        );
    }
    Ok(())
}

fn cmd_show(store: &SessionStore, session_id: &str) -> Result<()> {
    let record = store.index().find(session_id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

// ── `svault tag` / `remove` / `compact` ───────────────────────────────────────

fn cmd_tag(store: &SessionStore, session_id: &str, edit: &RecordEdit) -> Result<()> {
    let record = store
        .tag(session_id, edit)
        .with_context(|| format!("updating session {session_id}"))?;
    let tags = record.tags.iter().cloned().collect::<Vec<_>>().join(",");
    println!("{}  tags: {}", record.session_id, if tags.is_empty() { "-" } else { &tags });
    Ok(())
}

fn cmd_remove(store: &SessionStore, session_id: &str) -> Result<()> {
    let record = store
        .remove(session_id)
        .with_context(|| format!("removing session {session_id}"))?;
    println!("removed {}", record.session_id);
    Ok(())
}

fn cmd_compact(store: &SessionStore) -> Result<()> {
    let dropped = store.compact().context("compacting index")?;
    if dropped.is_empty() {
        println!("index is compact");
    } else {
        for id in &dropped {
            println!("dropped {id}");
        }
        println!("{} entr{} removed", dropped.len(), if dropped.len() == 1 { "y" } else { "ies" });
    }
    Ok(())
}

// ── `svault policy` ───────────────────────────────────────────────────────────

fn cmd_policy_show(store: &SessionStore) -> Result<()> {
    let policy = store.index().policy()?;
    println!("auto_encrypt:       {}", policy.auto_encrypt);
    println!("require_encryption: {}", policy.require_encryption);
    println!("key_rotation_days:  {}", policy.key_rotation_days);
    if policy.content_filters.is_empty() {
        println!("content_filters:    (none)");
    } else {
        println!("content_filters:");
        for filter in &policy.content_filters {
            println!("  - {filter}");
        }
    }
    Ok(())
}

// ── `svault backup` / `restore` / `regenerate` ────────────────────────────────

fn cmd_backup(store: &SessionStore, output: Option<&Path>, yes: bool) -> Result<()> {
    let answer = if yes {
        "yes".to_string()
    } else {
        eprintln!("This exports the master secret in the clear. Anyone holding the");
        eprintln!("backup can re-derive every session key. Store it offline.");
        prompt("Type \"yes\" to continue: ")?
    };
    let ack = BackupAcknowledgement::from_answer(&answer)?;

    let bundle = store
        .master()
        .export_for_backup(ack, store.config().scope.identifier.as_deref())
        .context("exporting master secret")?;
    let mut json = serde_json::to_string_pretty(&bundle).context("serializing backup bundle")?;
    json.push('\n');

    let written = match output {
        Some(path) => fsutil::atomic_write(path, json.as_bytes(), true)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{json}");
            Ok(())
        }
    };
    json.zeroize();
    written?;

    eprintln!("checksum: {}", bundle.checksum_line());
    if let Some(path) = output {
        eprintln!("backup written to {}", path.display());
    }
    Ok(())
}

async fn cmd_restore(
    store: &SessionStore,
    bundle_path: Option<&Path>,
    expected: Option<&str>,
) -> Result<()> {
    let secret = match bundle_path {
        Some(path) => {
            let mut content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let parsed = serde_json::from_str::<BackupBundle>(&content)
                .with_context(|| format!("parsing backup bundle {}", path.display()));
            content.zeroize();
            let bundle = parsed?;

            if let Some(expected) = expected {
                check_fingerprint("bundle", &bundle.fingerprint, expected)
                    .with_context(|| format!("checking {}", path.display()))?;
            }
            store.master().restore(&bundle).context("restoring from bundle")?
        }
        None => {
            let mut words = rpassword::prompt_password("Recovery mnemonic (24 words): ")
                .context("reading mnemonic")?;
            let restored = store.master().restore_from_mnemonic(&words, expected);
            words.zeroize();
            restored.context("restoring from mnemonic")?
        }
    };

    store.ensure_layout().context("preparing store layout")?;
    println!("restored master secret {}", short(&fingerprint(&secret)));
    Ok(())
}

fn cmd_regenerate(store: &SessionStore, confirm: Option<String>) -> Result<()> {
    let current = fingerprint(&store.master().load()?);
    let prefix = &current[..DestructiveConfirmation::PREFIX_LEN];

    let typed = match confirm {
        Some(typed) => typed,
        None => {
            eprintln!("Regenerating replaces master secret {prefix}. Sessions sealed to");
            eprintln!("derived keys cannot be opened afterwards without a backup.");
            prompt(&format!("Type {prefix} to confirm: "))?
        }
    };
    let confirmation = DestructiveConfirmation::new(&typed, &current)?;

    let secret = store
        .master()
        .regenerate(confirmation)
        .context("regenerating master secret")?;
    println!("new fingerprint: {}", short(&fingerprint(&secret)));
    println!("previous secret kept next to {}", store.master().path().display());
    Ok(())
}

// ── `svault verify` ───────────────────────────────────────────────────────────

fn cmd_verify(store: &SessionStore) -> Result<()> {
    let report = store.verify().context("verifying store")?;

    if let Some(fp) = &report.master_fingerprint {
        println!("master secret:    ok ({})", short(fp));
    }
    println!("sessions checked: {}", report.sessions_checked);
    for finding in &report.findings {
        println!("  ! {finding}");
    }

    if !report.is_clean() {
        anyhow::bail!("verification found {} problem(s)", report.findings.len());
    }
    println!("ok");
    Ok(())
}

// ── `svault config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &SvaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_encrypt_with_derived_recipient() {
        let cli = Cli::try_parse_from([
            "svault", "encrypt", "notes.md", "--type", "planning", "--index", "2", "--tag", "a",
            "--tag", "b", "--scope", "repo",
        ])
        .unwrap();
        match cli.command {
            Commands::Encrypt { session_type, index, tags, scope, recipient, .. } => {
                assert_eq!(session_type.as_deref(), Some("planning"));
                assert_eq!(index, 2);
                assert_eq!(tags, ["a", "b"]);
                assert_eq!(scope.scope.as_deref(), Some("repo"));
                assert!(recipient.is_none());
            }
            other => panic!("expected Encrypt, got: {other:?}"),
        }
    }

    #[test]
    fn test_recipient_conflicts_with_type() {
        assert!(Cli::try_parse_from([
            "svault", "encrypt", "f", "--recipient", "age1x", "--type", "planning",
        ])
        .is_err());
    }

    #[test]
    fn test_policy_set_flags() {
        let cli = Cli::try_parse_from([
            "svault", "policy", "set", "--require-encryption", "false", "--filter", "*.env",
        ])
        .unwrap();
        match cli.command {
            Commands::Policy {
                action: PolicyAction::Set { require_encryption, filters, auto_encrypt, .. },
            } => {
                assert_eq!(require_encryption, Some(false));
                assert_eq!(auto_encrypt, None);
                assert_eq!(filters, ["*.env"]);
            }
            other => panic!("expected Policy Set, got: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["svault", "verify", "--log", "debug", "-c", "/tmp/x.toml"])
            .unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert_eq!(cli.config, PathBuf::from("/tmp/x.toml"));
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short("0123456789abcdef0123"), "0123456789abcdef");
        assert_eq!(short("abc"), "abc");
    }
}
