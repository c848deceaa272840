//! Device cart commands.
//!
//! Each invocation opens the device cart under `CART_STORAGE_DIR`, restores
//! the session recorded by the last `login`/`logout`, runs one operation and
//! prints the resulting cart.
//!
//! # Environment Variables
//!
//! - `CART_API_BASE_URL` - Cart API base URL
//! - `CART_STORAGE_DIR` - Device storage directory
//! - `CART_ZERO_QUANTITY_POLICY` - `remove` or `keep`

use std::sync::Arc;

use thiserror::Error;

use newofyou_core::{CartSnapshot, ProductId, SessionContext, UserId};
use newofyou_storefront::{
    CartError, CartSession, CartStore, ClientConfig, ConfigError, FileStorage, HttpCartClient,
    LocalStorage, MergeOutcome, RemoteError, StorageError, keys,
};

/// Errors from cart commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cart API client error: {0}")]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Stored session is unreadable: {0}")]
    Session(#[from] serde_json::Error),
}

type DeviceSession = CartSession<Arc<FileStorage>, HttpCartClient>;

/// The device cart plus the storage it was opened from.
struct Device {
    storage: Arc<FileStorage>,
    session: DeviceSession,
}

impl Device {
    fn open() -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;
        let storage = Arc::new(FileStorage::open(config.storage_dir.clone())?);
        let context = load_context(&storage)?;
        let store = CartStore::load(
            Arc::clone(&storage),
            HttpCartClient::new(&config.api)?,
            config.zero_quantity_policy,
        )?;

        tracing::debug!(dir = %storage.dir().display(), mode = %context.mode(), "Device cart opened");
        Ok(Self {
            storage,
            session: CartSession::with_context(store, context),
        })
    }

    fn save_context(&self) -> Result<(), CliError> {
        save_context(&self.storage, self.session.context())
    }
}

/// Read the recorded session, defaulting to guest.
fn load_context(storage: &impl LocalStorage) -> Result<SessionContext, CliError> {
    match storage.get(keys::SESSION)? {
        Some(value) => Ok(serde_json::from_value(value)?),
        None => Ok(SessionContext::guest()),
    }
}

fn save_context(storage: &impl LocalStorage, context: &SessionContext) -> Result<(), CliError> {
    storage.set(keys::SESSION, &serde_json::to_value(context)?)?;
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(context: &SessionContext, cart: &CartSnapshot) {
    match context.user_id() {
        Some(user_id) => println!("Cart for {user_id}"),
        None => println!("Guest cart"),
    }
    if cart.is_empty() {
        println!("  (empty)");
        return;
    }
    for line in cart.lines() {
        println!("  {:<24} x{}", line.product_id, line.quantity);
    }
    println!(
        "  {} line(s), {} unit(s)",
        cart.line_count(),
        cart.total_quantity()
    );
}

/// Print the cart, fetching it from the API when logged in.
///
/// A guest cart left behind by a failed login is merged first.
///
/// # Errors
///
/// Returns `CliError` if the device cart cannot be opened, the API cannot
/// be reached, or a pending merge still fails.
pub async fn show() -> Result<(), CliError> {
    let device = Device::open()?;
    let cart = device
        .session
        .refresh()
        .await
        .inspect_err(merge_hint)?;
    print_cart(device.session.context(), &cart);

    if device.session.has_pending_merge()? {
        #[allow(clippy::print_stdout)]
        {
            println!("Guest cart not merged yet; run `np-cart merge` to retry.");
        }
    }
    Ok(())
}

/// Add units of a product.
///
/// # Errors
///
/// Returns `CliError` if the quantity is invalid or the change cannot be saved.
pub async fn add(product_id: &str, quantity: i64) -> Result<(), CliError> {
    let device = Device::open()?;
    let cart = device
        .session
        .add_line(ProductId::new(product_id), quantity)
        .await
        .inspect_err(merge_hint)?;
    print_cart(device.session.context(), &cart);
    Ok(())
}

/// Set the quantity of a line.
///
/// # Errors
///
/// Returns `CliError` if the quantity is invalid or the change cannot be saved.
pub async fn update(product_id: &str, quantity: i64) -> Result<(), CliError> {
    let device = Device::open()?;
    let cart = device
        .session
        .update_line_quantity(ProductId::new(product_id), quantity)
        .await
        .inspect_err(merge_hint)?;
    print_cart(device.session.context(), &cart);
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns `CliError` if the change cannot be saved.
pub async fn remove(product_id: &str) -> Result<(), CliError> {
    let device = Device::open()?;
    let cart = device
        .session
        .remove_line(&ProductId::new(product_id))
        .await
        .inspect_err(merge_hint)?;
    print_cart(device.session.context(), &cart);
    Ok(())
}

/// Log in as `user_id` and merge the guest cart.
///
/// The device stays logged in when the merge fails so `np-cart merge` can
/// retry it.
///
/// # Errors
///
/// Returns `CliError` if the session cannot be recorded or the merge fails.
pub async fn login(user_id: &str) -> Result<(), CliError> {
    let mut device = Device::open()?;
    let outcome = device.session.login(UserId::new(user_id)).await;
    device.save_context()?;

    report_merge(outcome?);
    print_cart(device.session.context(), &device.session.snapshot().await);
    Ok(())
}

/// Retry the guest cart merge for the logged-in user.
///
/// # Errors
///
/// Returns `CliError` if the merge fails again.
pub async fn merge() -> Result<(), CliError> {
    let mut device = Device::open()?;
    report_merge(device.session.retry_merge().await?);
    print_cart(device.session.context(), &device.session.snapshot().await);
    Ok(())
}

/// Log out and return to the guest cart.
///
/// # Errors
///
/// Returns `CliError` if the guest cart or the session cannot be read or written.
pub async fn logout() -> Result<(), CliError> {
    let mut device = Device::open()?;
    let cart = device.session.logout().await?;
    device.save_context()?;
    print_cart(device.session.context(), &cart);
    Ok(())
}

/// Point at `np-cart merge` when an operation stopped on an unmerged guest cart.
#[allow(clippy::print_stderr)]
fn merge_hint(err: &CartError) {
    if err.is_merge_failure() {
        eprintln!("Guest cart not merged yet; run `np-cart merge` to retry.");
    }
}

#[allow(clippy::print_stdout)]
fn report_merge(outcome: MergeOutcome) {
    match outcome {
        MergeOutcome::Skipped => println!("No guest cart to merge."),
        MergeOutcome::Merged { lines } => println!("Merged {lines} guest line(s)."),
    }
}
