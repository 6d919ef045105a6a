//! Resep - a command-line client for the recipe-sharing service.
//!
//! Log in, browse recipes, and manage your own recipes from the terminal.
//! The session is restored from storage on every run and kept for 7 days.

use std::future::Future;
use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use resep_core::api::{ApiClient, ApiError};
use resep_core::auth::{Identity, SessionStore};
use resep_core::config::{Config, API_URL_ENV};
use resep_core::guard::{require_owner, require_user, Access};
use resep_core::models::{split_ingredients, GeneratedRecipe, IngredientDraft, Recipe, RecipeDraft};
use resep_core::utils::mask_token;

// ============================================================================
// Constants
// ============================================================================

/// Width of the description column in recipe lists
const SUMMARY_WIDTH: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "resep", about = "Share and manage recipes from the terminal")]
struct Cli {
    /// Backend URL (overrides the configured one)
    #[arg(long, env = API_URL_ENV)]
    api_url: Option<String>,

    /// Keep the session in memory only; nothing is read from or written to storage
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create a new account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Log out and forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// List all recipes
    Recipes,
    /// List your own recipes
    Mine,
    /// Show a recipe with its ingredients
    Show { id: i64 },
    /// Add a recipe
    Add(RecipeArgs),
    /// Edit one of your recipes
    Edit {
        id: i64,
        #[command(flatten)]
        changes: RecipeArgs,
    },
    /// Delete one of your recipes
    Delete { id: i64 },
    /// Let the AI chef write a recipe from ingredients or a food photo
    Chef(ChefArgs),
}

#[derive(Args, Debug)]
struct ChefArgs {
    /// Ingredients on hand, separated by commas or newlines
    #[arg(long, conflicts_with = "photo", required_unless_present = "photo")]
    ingredients: Option<String>,
    /// Photo of a dish to identify (max 5 MB)
    #[arg(long)]
    photo: Option<PathBuf>,
    /// Publish the suggested recipe as one of yours
    #[arg(long)]
    save: bool,
}

#[derive(Args, Debug, Default)]
struct RecipeArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    instructions: Option<String>,
    /// Ingredient as `name=quantity`; repeat for each ingredient
    #[arg(long = "ingredient", value_parser = parse_ingredient)]
    ingredients: Vec<IngredientDraft>,
    /// Photo to upload with the recipe
    #[arg(long)]
    image: Option<PathBuf>,
}

impl RecipeArgs {
    /// Apply the given fields on top of `draft`. Ingredients replace the list.
    fn apply(self, mut draft: RecipeDraft) -> RecipeDraft {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(instructions) = self.instructions {
            draft.instructions = instructions;
        }
        if !self.ingredients.is_empty() {
            draft.ingredients = self.ingredients;
        }
        draft
    }
}

fn parse_ingredient(s: &str) -> Result<IngredientDraft, String> {
    IngredientDraft::parse(s).ok_or_else(|| format!("expected `name=quantity`, got `{}`", s))
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    let api_url = cli.api_url.clone().unwrap_or_else(|| config.api_url());
    let api = ApiClient::new(&api_url)?;
    debug!(api_url = %api.base_url(), "Using backend");

    // One store for the whole run, handed to every command
    let store = SessionStore::open(config.token_slot(cli.ephemeral)?);

    match cli.command {
        Command::Login { email } => login(&store, &api, &mut config, email).await,
        Command::Signup { email, name } => signup(&api, &email, &name).await,
        Command::Logout => logout(&store, &api).await,
        Command::Whoami => whoami(&store).await,
        Command::Recipes => list_recipes(&store, &api).await,
        Command::Mine => my_recipes(&store, &api).await,
        Command::Show { id } => show_recipe(&store, &api, id).await,
        Command::Add(args) => add_recipe(&store, &api, args).await,
        Command::Edit { id, changes } => edit_recipe(&store, &api, id, changes).await,
        Command::Delete { id } => delete_recipe(&store, &api, id).await,
        Command::Chef(args) => chef(&store, &api, args).await,
    }
}

// ============================================================================
// Session gating
// ============================================================================

/// Wait for the session to load, then apply the guard.
async fn authorize(store: &SessionStore, owner_id: Option<&str>) -> Result<Identity> {
    store.ready().await;
    let view = store.current();
    let access = match owner_id {
        Some(owner_id) => require_owner(&view, owner_id),
        None => require_user(&view),
    };

    match access {
        Access::Granted(user) => Ok(user),
        Access::RedirectToLogin => bail!("You need to log in first. Run `resep login`."),
        Access::Forbidden => bail!("You can only change your own recipes."),
        Access::Pending => bail!("Session is still loading"),
    }
}

/// API client carrying the current session token.
fn authed(store: &SessionStore, api: &ApiClient) -> Result<ApiClient> {
    match store.token() {
        Some(token) => Ok(api.with_token(token)),
        None => bail!("You need to log in first. Run `resep login`."),
    }
}

/// A 401 means the backend no longer honors the token; drop it locally too.
async fn forget_rejected_session(store: &SessionStore, err: anyhow::Error) -> anyhow::Error {
    if matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) {
        warn!("Backend rejected the session token");
        store.sign_out_async().await;
        return anyhow::anyhow!("Session expired. Please log in again.");
    }
    err
}

/// Run an authenticated call, forgetting the session if the backend rejects it.
async fn with_session<T>(store: &SessionStore, call: impl Future<Output = Result<T>>) -> Result<T> {
    match call.await {
        Ok(value) => Ok(value),
        Err(e) => Err(forget_rejected_session(store, e).await),
    }
}

// ============================================================================
// Account commands
// ============================================================================

async fn login(store: &SessionStore, api: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let token = api.login(&email, &password).await?;

    store.ready().await;
    let Some(user) = store.sign_in_async(&token).await else {
        bail!("Login succeeded but the server returned a token this client cannot read");
    };

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    info!(user_id = %user.id, "Logged in");
    println!("Logged in as {}", user.email);
    Ok(())
}

async fn signup(api: &ApiClient, email: &str, name: &str) -> Result<()> {
    let password = rpassword::prompt_password("Choose a password: ").context("Failed to read password")?;
    let confirm = rpassword::prompt_password("Repeat password: ").context("Failed to read password")?;
    if password != confirm {
        bail!("Passwords do not match");
    }

    api.signup(email, &password, name).await?;
    println!("Account created. Check {} for a verification email, then run `resep login`.", email);
    Ok(())
}

async fn logout(store: &SessionStore, api: &ApiClient) -> Result<()> {
    store.ready().await;
    if let Some(token) = store.token() {
        if let Err(e) = api.with_token(token).logout().await {
            warn!(error = %e, "Backend logout failed, clearing local session anyway");
        }
    }
    store.sign_out_async().await;
    println!("Logged out");
    Ok(())
}

async fn whoami(store: &SessionStore) -> Result<()> {
    let user = authorize(store, None).await?;
    println!("{} ({})", user.email, user.id);
    if let Some(token) = store.token() {
        println!("token: {}", mask_token(&token));
    }
    Ok(())
}

// ============================================================================
// Recipe commands
// ============================================================================

fn print_recipes(recipes: &[Recipe]) {
    if recipes.is_empty() {
        println!("No recipes yet.");
        return;
    }
    for recipe in recipes {
        println!(
            "#{:<5} {}  by {}, {}",
            recipe.id,
            recipe.title,
            recipe.author_display(),
            recipe.created_display()
        );
        let summary = recipe.summary(SUMMARY_WIDTH);
        if !summary.is_empty() {
            println!("       {}", summary);
        }
    }
}

async fn list_recipes(store: &SessionStore, api: &ApiClient) -> Result<()> {
    let recipes = api.recipes().await?;
    print_recipes(&recipes);

    store.ready().await;
    if let Some(user) = store.user() {
        let own = recipes.iter().filter(|r| r.owner_id == user.id).count();
        println!("\n{} of {} are yours", own, recipes.len());
    }
    Ok(())
}

async fn my_recipes(store: &SessionStore, api: &ApiClient) -> Result<()> {
    authorize(store, None).await?;
    let recipes = with_session(store, authed(store, api)?.my_recipes()).await?;
    print_recipes(&recipes);
    Ok(())
}

async fn show_recipe(store: &SessionStore, api: &ApiClient, id: i64) -> Result<()> {
    let detail = api.recipe(id).await?;
    let recipe = &detail.recipe;

    println!("{}", recipe.title);
    println!("by {}, {}", recipe.author_display(), recipe.created_display());
    if !recipe.description.is_empty() {
        println!("\n{}", recipe.description);
    }
    if let Some(ref url) = recipe.image_url {
        println!("\nImage: {}", url);
    }

    println!("\nIngredients:");
    for ingredient in &detail.ingredients {
        println!("  - {} ({})", ingredient.name, ingredient.quantity);
    }
    println!("\nInstructions:\n{}", recipe.instructions);

    store.ready().await;
    if require_owner(&store.current(), &recipe.owner_id).is_granted() {
        println!("\nThis is your recipe: `resep edit {0}` or `resep delete {0}`", recipe.id);
    }
    Ok(())
}

async fn add_recipe(store: &SessionStore, api: &ApiClient, args: RecipeArgs) -> Result<()> {
    authorize(store, None).await?;
    let image = args.image.clone();
    let draft = args.apply(RecipeDraft::default());

    with_session(store, authed(store, api)?.create_recipe(&draft, image.as_deref())).await?;
    println!("Added \"{}\"", draft.title);
    Ok(())
}

async fn edit_recipe(store: &SessionStore, api: &ApiClient, id: i64, changes: RecipeArgs) -> Result<()> {
    let detail = api.recipe(id).await?;
    authorize(store, Some(&detail.recipe.owner_id)).await?;

    let image = changes.image.clone();
    let draft = changes.apply(RecipeDraft::from_detail(&detail));

    with_session(store, authed(store, api)?.update_recipe(id, &draft, image.as_deref())).await?;
    println!("Updated \"{}\"", draft.title);
    Ok(())
}

async fn delete_recipe(store: &SessionStore, api: &ApiClient, id: i64) -> Result<()> {
    let detail = api.recipe(id).await?;
    authorize(store, Some(&detail.recipe.owner_id)).await?;

    with_session(store, authed(store, api)?.delete_recipe(id)).await?;
    println!("Deleted \"{}\"", detail.recipe.title);
    Ok(())
}

// ============================================================================
// AI chef
// ============================================================================

fn print_generated(recipe: &GeneratedRecipe) {
    println!("{}", recipe.title);
    if !recipe.description.is_empty() {
        println!("\n{}", recipe.description);
    }
    println!("\nIngredients:");
    for ingredient in &recipe.ingredients {
        println!("  - {} ({})", ingredient.name, ingredient.quantity);
    }
    println!("\nInstructions:\n{}", recipe.instructions);
}

async fn chef(store: &SessionStore, api: &ApiClient, args: ChefArgs) -> Result<()> {
    let generated = match (args.ingredients, args.photo) {
        (Some(ingredients), _) => {
            let list = split_ingredients(&ingredients)?;
            debug!(count = list.len(), "Asking the AI chef");
            api.generate_recipe(&list).await?
        }
        (None, Some(photo)) => api.identify_food(&photo).await?,
        (None, None) => bail!("Give either --ingredients or --photo"),
    };
    print_generated(&generated);

    if args.save {
        authorize(store, None).await?;
        let draft = generated.into_draft();
        with_session(store, authed(store, api)?.create_recipe(&draft, None)).await?;
        println!("\nAdded \"{}\"", draft.title);
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;

    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("No value entered");
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_add() {
        let cli = Cli::try_parse_from([
            "resep",
            "add",
            "--title",
            "Soto Ayam",
            "--ingredient",
            "Chicken=500 g",
            "--ingredient",
            "Turmeric=2 cm",
        ])
        .unwrap();

        match cli.command {
            Command::Add(args) => {
                let draft = args.apply(RecipeDraft::default());
                assert_eq!(draft.title, "Soto Ayam");
                assert_eq!(draft.ingredients.len(), 2);
                assert_eq!(draft.ingredients[1].quantity, "2 cm");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_chef() {
        let cli = Cli::try_parse_from(["resep", "chef", "--ingredients", "Telur, Cabai", "--save"]).unwrap();
        match cli.command {
            Command::Chef(args) => {
                assert_eq!(args.ingredients.as_deref(), Some("Telur, Cabai"));
                assert!(args.photo.is_none());
                assert!(args.save);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        // Exactly one source of inspiration
        assert!(Cli::try_parse_from(["resep", "chef"]).is_err());
        assert!(Cli::try_parse_from(["resep", "chef", "--ingredients", "Telur", "--photo", "soto.jpg"]).is_err());
    }

    #[test]
    fn test_cli_rejects_bad_ingredient() {
        assert!(Cli::try_parse_from(["resep", "add", "--ingredient", "salt"]).is_err());
    }

    #[test]
    fn test_edit_keeps_unchanged_fields() {
        let current = RecipeDraft {
            title: "Gado-gado".into(),
            description: "Salad".into(),
            instructions: "Mix".into(),
            ingredients: vec![IngredientDraft { name: "Tofu".into(), quantity: "1 block".into() }],
            image_url: Some("https://cdn.example.com/gado.jpg".into()),
        };
        let changes = RecipeArgs {
            description: Some("Peanut salad".into()),
            ..Default::default()
        };
        let draft = changes.apply(current);
        assert_eq!(draft.title, "Gado-gado");
        assert_eq!(draft.description, "Peanut salad");
        assert_eq!(draft.ingredients.len(), 1);
        assert_eq!(draft.image_url.as_deref(), Some("https://cdn.example.com/gado.jpg"));
    }

    #[tokio::test]
    async fn test_authorize_waits_for_session() {
        use resep_core::auth::MemorySlot;

        let store = SessionStore::open(MemorySlot::new());
        let err = authorize(&store, None).await.unwrap_err();
        assert!(err.to_string().contains("log in"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_forget_rejected_session_signs_out() {
        use resep_core::auth::MemorySlot;

        let store = SessionStore::new(MemorySlot::new());
        let err = forget_rejected_session(&store, ApiError::Unauthorized.into()).await;
        assert_eq!(err.to_string(), "Session expired. Please log in again.");

        let other = forget_rejected_session(&store, ApiError::RateLimited.into()).await;
        assert!(matches!(other.downcast_ref::<ApiError>(), Some(ApiError::RateLimited)));
    }
}
