//! Typed endpoints of the store backend.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument};

use ecomall_core::{
    CartEntry, CartRowId, CurrentUser, ItemId, OrderId, OrderRequest, PaymentConfirmation,
    PaymentOutcome, PlacedOrder, UserId, VerifiedPayment, WishlistEntry, WishlistRowId,
};

use super::rows::{
    CartRow, WishlistRow, convert_cart_row, convert_rows, convert_single, convert_wishlist_row,
};
use super::{ApiError, RemoteStoreClient};
use crate::config::ClientConfig;
use crate::sync::CartBackend;

const CART_PATH: &str = "cart/";
const WISHLIST_PATH: &str = "wishlist/";
const LOGIN_PATH: &str = "login/";
const REGISTER_PATH: &str = "register/";
const CREATE_ORDER_PATH: &str = "create-order/";
const VERIFY_PAYMENT_PATH: &str = "verify-payment/";
const PAYMENT_PENDING_PATH: &str = "payment-pending/";
const PAYMENT_FAILED_PATH: &str = "payment-failed/";

/// Shown when a registration is refused without field errors.
pub const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed";

#[derive(Serialize)]
struct CreateCartRowBody {
    user_id: UserId,
    item_id: ItemId,
    quantity: u32,
}

#[derive(Serialize)]
struct UpdateCartRowBody {
    quantity: u32,
}

#[derive(Serialize)]
struct CreateWishlistRowBody {
    user_id: UserId,
    item_id: ItemId,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    mobile_number: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct PaymentOutcomeBody {
    order_id: OrderId,
}

/// Details for a new customer account.
#[derive(Debug)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Digits only.
    pub mobile_number: String,
    pub password: SecretString,
}

impl NewAccount {
    /// Build an account from a single full-name field and a free-form phone
    /// number.
    ///
    /// The first word becomes the first name and the rest the last name
    /// (`"NA"` when there is none, since the backend requires one). Phone
    /// punctuation is stripped.
    #[must_use]
    pub fn from_full_name(name: &str, email: &str, phone: &str, password: SecretString) -> Self {
        let name = name.trim();
        let (first, rest) = name.split_once(' ').unwrap_or((name, ""));
        let last = rest.trim();

        Self {
            first_name: first.to_string(),
            last_name: if last.is_empty() { "NA" } else { last }.to_string(),
            email: email.trim().to_string(),
            mobile_number: phone.chars().filter(char::is_ascii_digit).collect(),
            password,
        }
    }
}

/// Store backend API: cart, wishlist, account and order endpoints.
#[derive(Clone)]
pub struct StoreApi {
    client: RemoteStoreClient,
}

impl StoreApi {
    /// Wrap an existing remote store client.
    #[must_use]
    pub const fn new(client: RemoteStoreClient) -> Self {
        Self { client }
    }

    /// Build the HTTP client and API from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::new(RemoteStoreClient::new(config)?))
    }

    /// The underlying JSON client.
    #[must_use]
    pub const fn client(&self) -> &RemoteStoreClient {
        &self.client
    }

    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` with the server's message when the
    /// credentials are rejected, or `ApiError::Malformed` when the response
    /// carries no user.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<CurrentUser, ApiError> {
        let body = LoginBody {
            email,
            password: password.expose_secret(),
        };
        let payload = self.client.post_json(LOGIN_PATH, &body).await?;
        user_from_payload(payload, "login")
    }

    /// Create a customer account. The response carries the new user, who is
    /// considered logged in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` when the backend refuses the details; its
    /// message joins the per-field errors (for example a duplicate email).
    #[instrument(skip_all)]
    pub async fn register(&self, account: &NewAccount) -> Result<CurrentUser, ApiError> {
        let body = RegisterBody {
            first_name: &account.first_name,
            last_name: &account.last_name,
            email: &account.email,
            mobile_number: &account.mobile_number,
            password: account.password.expose_secret(),
        };

        let payload = match self.client.post_json(REGISTER_PATH, &body).await {
            Ok(payload) => payload,
            Err(ApiError::Status {
                status, payload, ..
            }) => {
                return Err(ApiError::Status {
                    status,
                    message: field_errors(payload.as_ref())
                        .unwrap_or_else(|| REGISTRATION_FAILED_MESSAGE.to_string()),
                    payload,
                });
            }
            Err(e) => return Err(e),
        };

        let user = user_from_payload(payload, "registration")?;
        info!(user_id = %user.user_id, "Registered account");
        Ok(user)
    }

    /// Tell the backend a payment was abandoned or failed.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` (404) for an unknown order.
    #[instrument(skip_all, fields(order_id = %order, outcome = ?outcome))]
    pub async fn report_payment_outcome(
        &self,
        order: OrderId,
        outcome: PaymentOutcome,
    ) -> Result<(), ApiError> {
        let path = match outcome {
            PaymentOutcome::Pending => PAYMENT_PENDING_PATH,
            PaymentOutcome::Failed => PAYMENT_FAILED_PATH,
        };
        self.client
            .post_json(path, &PaymentOutcomeBody { order_id: order })
            .await?;
        Ok(())
    }
}

fn user_from_payload(payload: Option<Value>, what: &str) -> Result<CurrentUser, ApiError> {
    let user = payload
        .as_ref()
        .and_then(|p| p.get("user"))
        .cloned()
        .ok_or_else(|| ApiError::Malformed(format!("{what} response has no user")))?;

    serde_json::from_value(user).map_err(|e| ApiError::Malformed(format!("{what} user: {e}")))
}

/// Decode a whole response payload into `T`.
fn decode<T: DeserializeOwned>(payload: Option<Value>, what: &str) -> Result<T, ApiError> {
    let payload =
        payload.ok_or_else(|| ApiError::Malformed(format!("{what} response was empty")))?;
    serde_json::from_value(payload).map_err(|e| ApiError::Malformed(format!("{what}: {e}")))
}

/// Join validation errors of the form `{"field": ["problem", ...]}` into one
/// message.
fn field_errors(payload: Option<&Value>) -> Option<String> {
    let fields = payload?.as_object()?;
    let messages: Vec<&str> = fields
        .values()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect::<Vec<_>>(),
            Value::String(message) => vec![message.as_str()],
            _ => Vec::new(),
        })
        .collect();

    (!messages.is_empty()).then(|| messages.join(" "))
}

fn user_query(user: UserId) -> [(&'static str, String); 1] {
    [("user_id", user.to_string())]
}

#[async_trait]
impl CartBackend for StoreApi {
    #[instrument(skip_all, fields(user_id = %user))]
    async fn fetch_cart(&self, user: UserId) -> Result<Vec<CartEntry>, ApiError> {
        let payload = self.client.get_json(CART_PATH, &user_query(user)).await?;
        let entries = convert_rows::<CartRow, _>(payload, convert_cart_row)?;
        debug!(rows = entries.len(), "Fetched cart");
        Ok(entries)
    }

    #[instrument(skip_all, fields(user_id = %user, item_id = %item))]
    async fn create_cart_row(
        &self,
        user: UserId,
        item: ItemId,
        quantity: u32,
    ) -> Result<Option<CartEntry>, ApiError> {
        let body = CreateCartRowBody {
            user_id: user,
            item_id: item,
            quantity,
        };
        let payload = self.client.post_json(CART_PATH, &body).await?;
        Ok(convert_single::<CartRow, _>(payload, convert_cart_row))
    }

    #[instrument(skip_all, fields(row = %row))]
    async fn update_cart_row(
        &self,
        row: &CartRowId,
        quantity: u32,
    ) -> Result<Option<CartEntry>, ApiError> {
        let path = format!("{CART_PATH}{}/", row.as_str());
        let payload = self
            .client
            .patch_json(&path, &UpdateCartRowBody { quantity })
            .await?;
        Ok(convert_single::<CartRow, _>(payload, convert_cart_row))
    }

    #[instrument(skip_all, fields(row = %row))]
    async fn delete_cart_row(&self, row: &CartRowId) -> Result<(), ApiError> {
        let path = format!("{CART_PATH}{}/", row.as_str());
        self.client.delete_json(&path).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %user))]
    async fn fetch_wishlist(&self, user: UserId) -> Result<Vec<WishlistEntry>, ApiError> {
        let payload = self
            .client
            .get_json(WISHLIST_PATH, &user_query(user))
            .await?;
        let entries = convert_rows::<WishlistRow, _>(payload, convert_wishlist_row)?;
        debug!(rows = entries.len(), "Fetched wishlist");
        Ok(entries)
    }

    #[instrument(skip_all, fields(user_id = %user, item_id = %item))]
    async fn create_wishlist_row(
        &self,
        user: UserId,
        item: ItemId,
    ) -> Result<Option<WishlistEntry>, ApiError> {
        let body = CreateWishlistRowBody {
            user_id: user,
            item_id: item,
        };
        let payload = self.client.post_json(WISHLIST_PATH, &body).await?;
        Ok(convert_single::<WishlistRow, _>(payload, convert_wishlist_row))
    }

    #[instrument(skip_all, fields(row = %row))]
    async fn delete_wishlist_row(&self, row: &WishlistRowId) -> Result<(), ApiError> {
        let path = format!("{WISHLIST_PATH}{}/", row.as_str());
        self.client.delete_json(&path).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(user_id = %order.user_id, lines = order.items.len()))]
    async fn create_order(&self, order: &OrderRequest) -> Result<PlacedOrder, ApiError> {
        let payload = self.client.post_json(CREATE_ORDER_PATH, order).await?;
        let placed: PlacedOrder = decode(payload, "create-order")?;
        if placed.razorpay_order_id.trim().is_empty() {
            return Err(ApiError::Malformed(
                "create-order response has no gateway order".to_string(),
            ));
        }
        debug!(order_id = %placed.order_id, "Created order");
        Ok(placed)
    }

    #[instrument(skip_all, fields(gateway_order = %confirmation.razorpay_order_id))]
    async fn verify_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<VerifiedPayment, ApiError> {
        let payload = self
            .client
            .post_json(VERIFY_PAYMENT_PATH, confirmation)
            .await?;
        decode(payload, "verify-payment")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_account_from_full_name() {
        let password = SecretString::from("pw".to_string());
        let account = NewAccount::from_full_name(
            " Asha  Rao Kumar ",
            "asha@example.com",
            "+91 98-765",
            password,
        );
        assert_eq!(account.first_name, "Asha");
        assert_eq!(account.last_name, "Rao Kumar");
        assert_eq!(account.mobile_number, "9198765");

        let single =
            NewAccount::from_full_name("Asha", "a@b.c", "", SecretString::from(String::new()));
        assert_eq!(single.first_name, "Asha");
        assert_eq!(single.last_name, "NA");
    }

    #[test]
    fn test_field_errors() {
        let payload = json!({
            "email": ["user with this email already exists."],
            "mobile_number": ["This field may not be blank."]
        });
        assert_eq!(
            field_errors(Some(&payload)).unwrap(),
            "user with this email already exists. This field may not be blank."
        );
        assert!(field_errors(Some(&json!({}))).is_none());
        assert!(field_errors(Some(&json!(["not", "an", "object"]))).is_none());
        assert!(field_errors(None).is_none());
    }

    #[test]
    fn test_decode_requires_payload() {
        let err = decode::<PlacedOrder>(None, "create-order").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));

        let err =
            decode::<PlacedOrder>(Some(json!({"order_id": 1})), "create-order").unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }
}
