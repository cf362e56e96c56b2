use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Who a session acts as. Shop accounts carry the shop they operate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Shop {
        #[serde(rename = "shopId")]
        shop_id: Uuid,
    },
    Customer,
}

impl Role {
    pub fn bucket(&self) -> RoleBucket {
        match self {
            Role::Admin => RoleBucket::Admin,
            Role::Shop { .. } => RoleBucket::Shop,
            Role::Customer => RoleBucket::Customer,
        }
    }

    pub fn shop_id(&self) -> Option<Uuid> {
        match self {
            Role::Shop { shop_id } => Some(*shop_id),
            _ => None,
        }
    }

    pub fn is_customer(&self) -> bool {
        matches!(self, Role::Customer)
    }

    /// Admin and shop consoles see the whole catalog.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Shop { .. })
    }
}

/// Notification feeds are shared per role, not per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleBucket {
    Admin,
    Shop,
    Customer,
}

impl fmt::Display for RoleBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleBucket::Admin => "admin",
            RoleBucket::Shop => "shop",
            RoleBucket::Customer => "customer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    #[schema(ignore)]
    pub password_hash: String,
    #[serde(flatten)]
    pub role: Role,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Copy safe to hand out over the API.
    pub fn redacted(&self) -> User {
        User {
            password_hash: String::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub owner: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: i64,
    pub category: String,
    pub status: ProductStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_approved(&self) -> bool {
        self.status == ProductStatus::Approved
    }
}

/// Product snapshot taken when the line was added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i64,
    pub price: i64,
    pub shop_id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i64 = 9_999;

impl CartLine {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        Self {
            product_id: product.id,
            quantity,
            price: product.price,
            shop_id: product.shop_id,
            name: product.name.clone(),
            image: product.image.clone(),
        }
    }

    /// `None` when the line cannot be priced without overflowing.
    pub fn subtotal(&self) -> Option<i64> {
        self.price.checked_mul(self.quantity)
    }
}

pub fn cart_total(lines: &[CartLine]) -> Option<i64> {
    lines
        .iter()
        .try_fold(0i64, |total, line| total.checked_add(line.subtotal()?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// One-way lifecycle. `Refunded` exists for stored data but nothing leads to it.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Confirmed, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    BankTransfer,
    EWallet,
    CashOnDelivery,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub total: i64,
    pub date: DateTime<Utc>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shop_ids: Vec<Uuid>,
    pub payment_date: DateTime<Utc>,
    pub confirmed_date: Option<DateTime<Utc>>,
    pub shipped_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub cancelled_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub estimated_delivery: DateTime<Utc>,
    pub shipping_address: Option<String>,
    pub version: i64,
}

impl Order {
    pub fn involves_shop(&self, shop_id: Uuid) -> bool {
        self.shop_ids.contains(&shop_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// One shop's share of an order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub shop_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: TransactionStatus,
    pub transaction_id: String,
    pub payment_date: DateTime<Utc>,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PromotionType {
    Percentage,
    Fixed,
    Freeship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PromotionStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PromotionType,
    pub value: i64,
    pub min_order_value: i64,
    pub max_discount: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: PromotionStatus,
    pub usage_count: i64,
    pub max_usage: Option<i64>,
    pub applicable_products: Vec<Uuid>,
    pub applicable_users: Vec<Uuid>,
}

impl Promotion {
    pub fn is_running(&self, now: DateTime<Utc>) -> bool {
        self.status == PromotionStatus::Active && self.start_date <= now && now <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SupportStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportRequest {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: SupportStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Order,
    Product,
    Support,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub priority: Priority,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct NotificationBuckets {
    #[serde(default)]
    pub admin: Vec<Notification>,
    #[serde(default)]
    pub shop: Vec<Notification>,
    #[serde(default)]
    pub customer: Vec<Notification>,
}

impl NotificationBuckets {
    pub fn bucket(&self, role: RoleBucket) -> &Vec<Notification> {
        match role {
            RoleBucket::Admin => &self.admin,
            RoleBucket::Shop => &self.shop,
            RoleBucket::Customer => &self.customer,
        }
    }

    pub fn bucket_mut(&mut self, role: RoleBucket) -> &mut Vec<Notification> {
        match role {
            RoleBucket::Admin => &mut self.admin,
            RoleBucket::Shop => &mut self.shop,
            RoleBucket::Customer => &mut self.customer,
        }
    }
}
