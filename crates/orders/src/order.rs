use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storecore_catalog::ProductId;
use storecore_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storecore_events::Event;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Fulfillment lifecycle. Transitions are strictly linear and forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    New,
    Confirmed,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// The only status this one may advance to, if any.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::New => Some(OrderStatus::Confirmed),
            OrderStatus::Confirmed => Some(OrderStatus::Shipped),
            OrderStatus::Shipped => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment settlement state. `Paid` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Card,
    BankTransfer,
    MobileMoney,
}

/// Who placed the order. Guest checkout: no account required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Order line: product, quantity, unit price snapshotted at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g. cents).
    pub unit_price: u64,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer: Option<CustomerInfo>,
    payment_method: Option<PaymentMethod>,
    lines: Vec<OrderLine>,
    total_amount: u64,
    status: OrderStatus,
    payment_status: PaymentStatus,
    provider_ref: Option<String>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            customer: None,
            payment_method: None,
            lines: Vec::new(),
            total_amount: 0,
            status: OrderStatus::New,
            payment_status: PaymentStatus::Pending,
            provider_ref: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn provider_ref(&self) -> Option<&str> {
        self.provider_ref.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VerifyPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayment {
    pub order_id: OrderId,
    pub success: bool,
    pub provider_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdvanceStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceStatus {
    pub order_id: OrderId,
    pub new_status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    VerifyPayment(VerifyPayment),
    AdvanceStatus(AdvanceStatus),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub lines: Vec<OrderLine>,
    pub total_amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentVerified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerified {
    pub order_id: OrderId,
    pub success: bool,
    pub provider_ref: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    PaymentVerified(PaymentVerified),
    OrderStatusChanged(OrderStatusChanged),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::PaymentVerified(_) => "orders.order.payment_verified",
            OrderEvent::OrderStatusChanged(_) => "orders.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::PaymentVerified(e) => e.occurred_at,
            OrderEvent::OrderStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.customer = Some(e.customer.clone());
                self.payment_method = Some(e.payment_method);
                self.lines = e.lines.clone();
                self.total_amount = e.total_amount;
                self.status = OrderStatus::New;
                self.payment_status = PaymentStatus::Pending;
                self.created = true;
            }
            OrderEvent::PaymentVerified(e) => {
                self.payment_status = if e.success {
                    PaymentStatus::Paid
                } else {
                    PaymentStatus::Failed
                };
                self.provider_ref = e.provider_ref.clone();
            }
            OrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::VerifyPayment(cmd) => self.handle_verify_payment(cmd),
            OrderCommand::AdvanceStatus(cmd) => self.handle_advance_status(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }

        if cmd.customer.name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if cmd.customer.email.trim().is_empty() {
            return Err(DomainError::validation("customer email cannot be empty"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must have at least one line"));
        }

        let mut total_amount: u64 = 0;
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            let line_total = (line.quantity as u64)
                .checked_mul(line.unit_price)
                .and_then(|t| total_amount.checked_add(t));
            total_amount = match line_total {
                Some(t) => t,
                None => return Err(DomainError::validation("order total overflows")),
            };
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            customer: cmd.customer.clone(),
            payment_method: cmd.payment_method,
            lines: cmd.lines.clone(),
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify_payment(&self, cmd: &VerifyPayment) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        match self.payment_status {
            PaymentStatus::Pending => {}
            PaymentStatus::Paid => {
                // Re-delivery of the same outcome is a no-op.
                if cmd.success {
                    return Ok(vec![]);
                }
                return Err(DomainError::conflict("payment already verified as paid"));
            }
            PaymentStatus::Failed => {
                if !cmd.success {
                    return Ok(vec![]);
                }
                return Err(DomainError::conflict("payment already verified as failed"));
            }
        }

        let mut events = vec![OrderEvent::PaymentVerified(PaymentVerified {
            order_id: cmd.order_id,
            success: cmd.success,
            provider_ref: cmd.provider_ref.clone(),
            occurred_at: cmd.occurred_at,
        })];

        // A settled payment confirms a freshly placed order.
        if cmd.success && self.status == OrderStatus::New {
            events.push(OrderEvent::OrderStatusChanged(OrderStatusChanged {
                order_id: cmd.order_id,
                from: OrderStatus::New,
                to: OrderStatus::Confirmed,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_advance_status(&self, cmd: &AdvanceStatus) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.status.next() != Some(cmd.new_status) {
            return Err(DomainError::conflict(format!(
                "cannot move order from {} to {}",
                self.status, cmd.new_status
            )));
        }

        Ok(vec![OrderEvent::OrderStatusChanged(OrderStatusChanged {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.new_status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
