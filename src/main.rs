use clap::{Parser, Subcommand};
use product_montage::album::FolderId;
use product_montage::gemini::GeminiClient;
use product_montage::image::{Image, ImageId};
use product_montage::montage::GenerationState;
use product_montage::session::Session;
use product_montage::store::FileStore;
use product_montage::{config, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "montage")]
#[command(about = "Product album and AI montage generator")]
#[command(long_about = "\
Product album and AI montage generator

Keep a personal album of product images, organized into folders, and compose
any of them onto a character photo with an image-generation model.

Typical session:

  montage login ana@example.com --password secret
  montage add sneakers.png
  montage folder create Shoes
  montage move <IMAGE_ID> --to <FOLDER_ID>
  montage generate --character me.jpg --product <IMAGE_ID> --prompt \"on a beach\"

The API key is read from the environment variable named in config.toml
(API_KEY by default). Run 'montage gen-config' for a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding the album and identity slots
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and load the stored album
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign up with an empty album
    Signup {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Print the album tree
    Album,
    /// Upload a product image into the album
    Add { file: PathBuf },
    /// Delete an image from the album
    Remove { image_id: String },
    /// Manage folders
    #[command(subcommand)]
    Folder(FolderCommand),
    /// Move an image into a folder, or back to the root without --to
    Move {
        image_id: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Generate a montage from a character photo and a product image
    Generate {
        /// Character photo
        #[arg(long)]
        character: PathBuf,
        /// Album image to use as the product
        #[arg(long, conflicts_with = "product_file", required_unless_present = "product_file")]
        product: Option<String>,
        /// Product image file, uploaded into the album first
        #[arg(long)]
        product_file: Option<PathBuf>,
        /// Extra instruction for the model
        #[arg(long, default_value = "")]
        prompt: String,
        /// Where to write the montage (default: montage.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum FolderCommand {
    /// Create a folder (default name: "New folder")
    Create { name: Option<String> },
    /// Rename a folder
    Rename { id: String, name: String },
    /// Delete a folder, moving its images to the root
    Delete { id: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir;

    // Config and storage are opened on first use, so `gen-config` works
    // without either.
    let load_config = || config::load_config(Path::new("."));
    let open_session = || -> Result<Session, Box<dyn std::error::Error>> {
        let app_config = load_config()?;
        let data_dir = data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&app_config.storage.data_dir));
        Ok(Session::new(Box::new(FileStore::open(&data_dir)?)))
    };

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Login { email, password } => {
            let mut session = open_session()?;
            session.login(&email, &password)?;
            println!("Signed in as {}", email.trim());
        }
        Command::Signup { email, password } => {
            let mut session = open_session()?;
            session.signup(&email, &password)?;
            println!("Signed up as {}", email.trim());
        }
        Command::Logout => {
            let mut session = open_session()?;
            session.logout();
            println!("Signed out");
        }
        Command::Whoami => match open_session()?.current_user() {
            Some(user) => println!("{}", user),
            None => println!("Not signed in"),
        },
        Command::Album => {
            let session = open_session()?;
            let user = session.current_user().ok_or("not signed in")?;
            output::print_album(user, session.album());
        }
        Command::Add { file } => {
            let mut session = open_session()?;
            let outcome = session.upload_product_image(Image::from_file(&file)?)?;
            println!("{}", output::format_add_outcome(&outcome));
        }
        Command::Remove { image_id } => {
            let mut session = open_session()?;
            if !session.delete_image(&ImageId::from(image_id.as_str()))? {
                println!("No image {}", image_id);
            }
        }
        Command::Folder(FolderCommand::Create { name }) => {
            let mut session = open_session()?;
            let id = session.create_folder(name.as_deref())?;
            println!("Created folder {}", id);
        }
        Command::Folder(FolderCommand::Rename { id, name }) => {
            let mut session = open_session()?;
            if !session.rename_folder(&FolderId::from(id.as_str()), &name)? {
                println!("Nothing to rename");
            }
        }
        Command::Folder(FolderCommand::Delete { id }) => {
            let mut session = open_session()?;
            if !session.delete_folder(&FolderId::from(id.as_str()))? {
                println!("No folder {}", id);
            }
        }
        Command::Move { image_id, to } => {
            let mut session = open_session()?;
            let destination = to.as_deref().map(FolderId::from);
            if !session.move_image(&ImageId::from(image_id.as_str()), destination.as_ref())? {
                println!("Nothing moved");
            }
        }
        Command::Generate {
            character,
            product,
            product_file,
            prompt,
            out,
        } => {
            let app_config = load_config()?;
            let mut session = open_session()?;
            session.set_character_image(Some(Image::from_file(&character)?));
            match (product, product_file) {
                (Some(id), _) => session.select_product(&ImageId::from(id.as_str()))?,
                (None, Some(file)) => {
                    let outcome = session.upload_product_image(Image::from_file(&file)?)?;
                    println!("{}", output::format_add_outcome(&outcome));
                }
                (None, None) => return Err("either --product or --product-file is required".into()),
            }
            session.set_instruction(prompt);

            let client = GeminiClient::from_config(&app_config.generation)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let state = runtime.block_on(session.generate(&client))?;

            match state {
                GenerationState::Succeeded(montage) => {
                    let path = out.unwrap_or_else(|| default_output_path(montage.image.mime_type()));
                    std::fs::write(&path, montage.image.payload())?;
                    output::print_generation_state(state, Some(&path));
                }
                GenerationState::Failed(message) => {
                    return Err(format!("montage failed: {message}").into());
                }
                other => output::print_generation_state(other, None),
            }
        }
    }

    Ok(())
}

/// `montage.<ext>` in the working directory, with the extension for `mime`.
fn default_output_path(mime: &str) -> PathBuf {
    let ext = match mime {
        "image/jpeg" => "jpg",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .copied()
            .unwrap_or("png"),
    };
    PathBuf::from(format!("montage.{ext}"))
}
