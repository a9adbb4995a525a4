//! Notification and alert rule types

string_enum! {
    /// Event an alert rule subscribes to
    pub enum AlertType {
        InventoryLow => "inventory_low",
        PoReceived => "po_received",
        RequestApproved => "request_approved",
    }
}
