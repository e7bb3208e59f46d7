//! placedoc CLI: manage placement documents from the command line.
//!
//! Configuration comes from the environment or a `.env` file (DATABASE_URL,
//! STORAGE_BACKEND, the container names, ...). Credentials are passed with
//! `--email`/`--password` or PLACEDOC_EMAIL/PLACEDOC_PASSWORD.

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use placedoc_cli::{
    build_service, init_tracing, parse_files, seed_admin, user_error, write_stream, ItemReport,
};
use placedoc_core::models::{FileRef, NewUser};
use placedoc_core::{AppError, Area, Config, Role, SubmissionIdentity};
use placedoc_engine::{Ack, PlacementService, RequestContext};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "placedoc", about = "Placement document lifecycle CLI")]
struct Cli {
    /// Account email
    #[arg(long, global = true, env = "PLACEDOC_EMAIL")]
    email: Option<String>,
    /// Account password
    #[arg(long, global = true, env = "PLACEDOC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations, optionally creating the first admin
    Migrate {
        /// Email of an admin account to create
        #[arg(long, requires = "admin_password")]
        admin_email: Option<String>,
        /// Password of the admin account
        #[arg(long, env = "PLACEDOC_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,
        /// Display name of the admin account
        #[arg(long, default_value = "Administrator")]
        admin_name: String,
    },
    /// Upload a file into your own submission
    Upload {
        department: String,
        directory: String,
        /// Path to the file to upload
        file: PathBuf,
        /// Name to store the file under (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Archive pending files (department/directory/roll_number/file_name)
    Archive {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Reject pending files with a reason
    Reject {
        #[arg(long)]
        reason: String,
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// List your open rejections
    Rejections,
    /// List departments
    Departments,
    /// List directories of a department
    Directories {
        /// pending, archive or reject
        #[arg(long, default_value = "pending")]
        area: Area,
        department: String,
    },
    /// List roll numbers with files in a directory
    Rolls {
        #[arg(long, default_value = "pending")]
        area: Area,
        department: String,
        directory: String,
    },
    /// List the files of one submission
    Files {
        #[arg(long, default_value = "pending")]
        area: Area,
        department: String,
        directory: String,
        roll_number: String,
    },
    /// Download files; several files or `--zip` produce a zip bundle
    Download {
        #[arg(long, default_value = "archive")]
        area: Area,
        #[arg(required = true)]
        paths: Vec<String>,
        /// Where to write the result
        #[arg(long, short)]
        output: PathBuf,
        /// Bundle even a single file
        #[arg(long)]
        zip: bool,
    },
    /// Administration
    Admin {
        #[command(subcommand)]
        sub: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a user account
    AddUser {
        email: String,
        /// Uploader, Accessor, Manager or Admin
        #[arg(long)]
        role: Role,
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll_number: String,
        /// Password for the new account
        #[arg(long, env = "PLACEDOC_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    /// Add a department
    AddDepartment { name: String },
    /// Create an empty directory under a department
    CreateDirectory { department: String, directory: String },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Print one compact JSON line per item; fails if any item failed
fn print_batch(files: &[FileRef], results: &[Result<Ack, AppError>]) -> anyhow::Result<()> {
    let mut failed = 0;
    for (file, result) in files.iter().zip(results) {
        let report = ItemReport::from_result(file, result);
        if !report.ok {
            failed += 1;
        }
        println!(
            "{}",
            serde_json::to_string(&report).context("Serialize item report")?
        );
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed", failed, files.len());
    }
    Ok(())
}

async fn login(service: &PlacementService, cli: &Cli) -> anyhow::Result<RequestContext> {
    let email = cli
        .email
        .as_deref()
        .context("Missing --email (or PLACEDOC_EMAIL)")?;
    let password = cli
        .password
        .as_deref()
        .context("Missing --password (or PLACEDOC_PASSWORD)")?;
    service.login(email, password).await.map_err(user_error)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_format);

    if let Commands::Migrate {
        admin_email,
        admin_password,
        admin_name,
    } = &cli.command
    {
        let pool = placedoc_db::connect(&config.database).await?;
        placedoc_db::run_migrations(&pool).await?;
        if let (Some(email), Some(password)) = (admin_email, admin_password) {
            let principal = seed_admin(&config, email, password, admin_name).await?;
            print_json(&principal)?;
        }
        return Ok(());
    }

    let service = build_service(&config).await?;
    let ctx = login(&service, &cli).await?;

    match cli.command {
        Commands::Migrate { .. } => {}
        Commands::Upload {
            department,
            directory,
            file,
            name,
        } => {
            let file_name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .context("Cannot derive a file name; pass --name")?,
            };
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let ack = service
                .upload(&ctx, &department, &directory, &file_name, Bytes::from(content))
                .await
                .map_err(user_error)?;
            print_json(&ack)?;
        }
        Commands::Archive { paths } => {
            let files = parse_files(&paths).map_err(user_error)?;
            let results = service.archive(&ctx, &files).await.map_err(user_error)?;
            print_batch(&files, &results)?;
        }
        Commands::Reject { reason, paths } => {
            let files = parse_files(&paths).map_err(user_error)?;
            let results = service
                .reject(&ctx, &files, &reason)
                .await
                .map_err(user_error)?;
            print_batch(&files, &results)?;
        }
        Commands::Rejections => {
            let records = service.my_rejections(&ctx).await.map_err(user_error)?;
            print_json(&records)?;
        }
        Commands::Departments => {
            let departments = service.list_departments(&ctx).await.map_err(user_error)?;
            print_json(&departments)?;
        }
        Commands::Directories { area, department } => {
            let directories = service
                .list_directories(&ctx, area, &department)
                .await
                .map_err(user_error)?;
            print_json(&directories)?;
        }
        Commands::Rolls {
            area,
            department,
            directory,
        } => {
            let rolls = service
                .list_roll_numbers(&ctx, area, &department, &directory)
                .await
                .map_err(user_error)?;
            print_json(&rolls)?;
        }
        Commands::Files {
            area,
            department,
            directory,
            roll_number,
        } => {
            let identity =
                SubmissionIdentity::new(&department, &directory, &roll_number).map_err(user_error)?;
            let files = service
                .list_files(&ctx, area, &identity)
                .await
                .map_err(user_error)?;
            print_json(&files)?;
        }
        Commands::Download {
            area,
            paths,
            output,
            zip,
        } => {
            let files = parse_files(&paths).map_err(user_error)?;
            let size_bytes = match files.as_slice() {
                [single] if !zip => {
                    let stream = service
                        .download(&ctx, area, single)
                        .await
                        .map_err(user_error)?;
                    write_stream(stream, &output).await?
                }
                _ => {
                    let data = service
                        .download_bundle(&ctx, area, &files)
                        .await
                        .map_err(user_error)?;
                    tokio::fs::write(&output, &data)
                        .await
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    data.len() as u64
                }
            };
            print_json(&serde_json::json!({
                "output": output.display().to_string(),
                "files": files.len(),
                "size_bytes": size_bytes,
            }))?;
        }
        Commands::Admin { sub } => match sub {
            AdminCommands::AddUser {
                email,
                role,
                name,
                roll_number,
                new_password,
            } => {
                let principal = service
                    .add_user(
                        &ctx,
                        NewUser {
                            email,
                            password: new_password,
                            role,
                            name,
                            roll_number,
                        },
                    )
                    .await
                    .map_err(user_error)?;
                print_json(&principal)?;
            }
            AdminCommands::AddDepartment { name } => {
                let created = service
                    .add_department(&ctx, &name)
                    .await
                    .map_err(user_error)?;
                print_json(&serde_json::json!({ "department": name, "created": created }))?;
            }
            AdminCommands::CreateDirectory {
                department,
                directory,
            } => {
                let key = service
                    .create_directory(&ctx, &department, &directory)
                    .await
                    .map_err(user_error)?;
                print_json(&serde_json::json!({ "placeholder": key }))?;
            }
        },
    }

    Ok(())
}
