//! bookly command-line entry point.

use bookly::{
    AppState,
    config::{AuthCommand, BookCommand, Cli, Command, Config, ProfileCommand, ProgressCommand},
    db::Database,
    library::Book,
    viewmodels::{AuthState, OperationResult, UploadState},
};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookly=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Command::Init { force } => cmd_init(force).await,
        Command::Auth { action } => cmd_auth(action, AppState::open(config)?).await,
        Command::Profile { action } => cmd_profile(action, signed_in(config).await?).await,
        Command::Book { action } => cmd_book(action, signed_in(config).await?).await,
        Command::Progress { action } => cmd_progress(action, signed_in(config).await?).await,
    }
}

/// Open the application state and restore the persisted session.
async fn signed_in(config: Config) -> anyhow::Result<AppState> {
    let state = AppState::open(config)?;
    if state.auth.current_user().await?.is_none() {
        anyhow::bail!("Not signed in. Run: bookly auth login <email>");
    }
    Ok(state)
}

/// Initialize config and database.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    std::fs::create_dir_all(&config.storage.root)?;
    std::fs::create_dir_all(&config.library.downloads_dir)?;

    println!("\nEdit config.toml to configure storage.");
    println!("Then run: bookly auth register <name> <email>");

    Ok(())
}

/// Account commands.
async fn cmd_auth(action: AuthCommand, state: AppState) -> anyhow::Result<()> {
    let vm = state.auth_view_model();

    match action {
        AuthCommand::Register {
            name,
            email,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };
            vm.register(&name, &email, &password).await;
        }

        AuthCommand::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };
            vm.login(&email, &password).await;
        }

        AuthCommand::Logout => {
            vm.logout().await;
            if let AuthState::Error(message) = &*vm.auth_state().borrow() {
                anyhow::bail!("{}", message);
            }
            println!("Signed out.");
            return Ok(());
        }

        AuthCommand::Whoami => vm.check_current_user().await,
    }

    let auth_state = vm.auth_state().borrow().clone();
    match auth_state {
        AuthState::Authenticated(user) => {
            println!("Signed in as {} <{}> (id: {})", user.name, user.email, user.id);
        }
        AuthState::Unauthenticated => println!("Not signed in."),
        AuthState::Error(message) => anyhow::bail!("{}", message),
        AuthState::Loading => {}
    }

    Ok(())
}

/// Profile commands.
async fn cmd_profile(action: ProfileCommand, state: AppState) -> anyhow::Result<()> {
    let vm = state.profile_view_model();
    vm.load_user().await;

    match action {
        ProfileCommand::Show => {}

        ProfileCommand::Update { name, phone } => {
            let mut user = loaded_user(&vm.user_state().borrow())?;
            if let Some(name) = name {
                user.name = name;
            }
            if let Some(phone) = phone {
                user.phone_number = (!phone.is_empty()).then_some(phone);
            }
            vm.set_editing(true);
            vm.update_user(&user).await;
        }

        ProfileCommand::Avatar { path } => vm.update_avatar(&path).await,
    }

    let user = loaded_user(&vm.user_state().borrow())?;
    println!("{:<8} {}", "ID", user.id);
    println!("{:<8} {}", "NAME", user.name);
    println!("{:<8} {}", "EMAIL", user.email);
    println!("{:<8} {}", "PHONE", user.phone_number.as_deref().unwrap_or("-"));
    println!("{:<8} {}", "AVATAR", user.avatar_image_url.as_deref().unwrap_or("-"));

    Ok(())
}

fn loaded_user(
    state: &Option<OperationResult<bookly::library::User>>,
) -> anyhow::Result<bookly::library::User> {
    match state {
        Some(OperationResult::Success(user)) => Ok(user.clone()),
        Some(OperationResult::Error(message)) => anyhow::bail!("{}", message),
        _ => anyhow::bail!("Profile not loaded"),
    }
}

/// Library commands.
async fn cmd_book(action: BookCommand, state: AppState) -> anyhow::Result<()> {
    let vm = state.books_view_model();

    match action {
        BookCommand::List => {
            vm.load_books().await;
            print_books(&vm.books_state().borrow())?;
        }

        BookCommand::Search { query } => {
            vm.search_books(&query).await;
            print_books(&vm.books_state().borrow())?;
        }

        BookCommand::Upload {
            path,
            title,
            author,
        } => {
            let mut upload_state = vm.upload_state();
            let printer = tokio::spawn(async move {
                while upload_state.changed().await.is_ok() {
                    if let UploadState::Loading(fraction) = *upload_state.borrow_and_update() {
                        eprint!("\rUploading... {:>3.0}%", fraction * 100.0);
                    }
                }
            });

            vm.upload_book(&path, &title, &author).await;
            printer.abort();
            eprintln!();

            let upload_state = vm.upload_state().borrow().clone();
            match upload_state {
                UploadState::Success(book) => {
                    println!("Uploaded: {} (id: {})", book.title, book.id)
                }
                UploadState::Error(message) => anyhow::bail!("{}", message),
                _ => {}
            }
        }

        BookCommand::Download { id } => {
            let book = state.books.load_book_by_id(&id).await?;
            match vm.download_book(&book).await {
                OperationResult::Success(book) => println!(
                    "Downloaded: {} -> {}",
                    book.title,
                    book.local_path.as_deref().unwrap_or_default()
                ),
                OperationResult::Error(message) => anyhow::bail!("{}", message),
                OperationResult::Loading => {}
            }
        }

        BookCommand::Delete { id } => {
            let book = state.books.load_book_by_id(&id).await?;
            if let OperationResult::Error(message) = vm.delete_book(&book).await {
                anyhow::bail!("{}", message);
            }
            println!("Deleted: {}", book.title);
        }

        BookCommand::Read { id } => {
            let reader = state.reading_view_model();
            reader.load_book_by_id(&id).await;

            let content = reader.book_content().borrow().clone();
            match content {
                Some(OperationResult::Success(text)) => {
                    if let Some(progress) = reader.reading_progress().borrow().as_ref() {
                        eprintln!(
                            "Progress: {:.0}% (page {}/{})",
                            progress.progress * 100.0,
                            progress.current_page,
                            progress.total_pages
                        );
                    }
                    println!("{}", text);
                }
                Some(OperationResult::Error(message)) => anyhow::bail!("{}", message),
                _ => {}
            }
        }

        BookCommand::Sync => {
            let added = state.sync_books_use_case().execute().await?;
            println!("Added {} book(s) from the remote catalog.", added);
        }
    }

    Ok(())
}

fn print_books(state: &OperationResult<Vec<Book>>) -> anyhow::Result<()> {
    let books = match state {
        OperationResult::Success(books) => books,
        OperationResult::Error(message) => anyhow::bail!("{}", message),
        OperationResult::Loading => return Ok(()),
    };

    if books.is_empty() {
        println!("No books found.");
        return Ok(());
    }

    println!("{:<36} {:<6} {:<4} {:<30} AUTHOR", "ID", "FORMAT", "LOCAL", "TITLE");
    println!("{}", "-".repeat(100));
    for book in books {
        println!(
            "{:<36} {:<6} {:<4} {:<30} {}",
            book.id,
            book.format.as_str(),
            if book.is_downloaded() { "yes" } else { "no" },
            truncate(&book.title, 30),
            book.author
        );
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max - 1).collect();
        format!("{}…", cut)
    }
}

/// Reading progress commands.
async fn cmd_progress(action: ProgressCommand, state: AppState) -> anyhow::Result<()> {
    match action {
        ProgressCommand::Show { id } => {
            let book = state.books.load_book_by_id(&id).await?;
            let progress = state.books.get_reading_progress(&book.id).await?;
            println!(
                "{}: {:.0}% (page {}/{})",
                book.title,
                progress.progress * 100.0,
                progress.current_page,
                progress.total_pages
            );
        }

        ProgressCommand::Save {
            id,
            progress,
            page,
            total,
        } => {
            let book = state.books.load_book_by_id(&id).await?;
            let record = bookly::library::ReadingProgress {
                book_id: book.id.clone(),
                progress,
                current_page: page,
                total_pages: total,
            };
            state.books.save_reading_progress(&record).await?;
            println!("Saved progress for {}: {:.0}%", book.title, progress * 100.0);
        }
    }

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
