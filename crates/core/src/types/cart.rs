//! Cart lines and snapshots.
//!
//! A [`CartSnapshot`] holds at most one [`CartLine`] per product, and no
//! line holds more than [`Quantity::MAX`] units. Every mutation goes through
//! methods that keep both invariants, and deserializing stored data folds
//! duplicate product ids by summing their quantities.

use serde::{Deserialize, Serialize};

use super::{ProductId, Quantity, QuantityError};

/// Sum two line quantities, clamped to the per-line maximum.
const fn clamped_sum(a: u32, b: u32) -> u32 {
    let sum = a.saturating_add(b);
    if sum > Quantity::MAX { Quantity::MAX } else { sum }
}

/// One product and how many units of it are in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    /// Create a line.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// The full set of lines in a cart at one instant.
///
/// Line order is insertion order but carries no meaning; use
/// [`CartSnapshot::same_lines`] to compare snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLine>", into = "Vec<CartLine>")]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a snapshot from arbitrary lines, folding duplicate products.
    ///
    /// Quantities above [`Quantity::MAX`] are clamped.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut snapshot = Self::new();
        for mut line in lines {
            match snapshot.line_mut(&line.product_id) {
                Some(existing) => existing.quantity = clamped_sum(existing.quantity, line.quantity),
                None => {
                    line.quantity = line.quantity.min(Quantity::MAX);
                    snapshot.lines.push(line);
                }
            }
        }
        snapshot
    }

    /// All lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Consume the snapshot and return its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    /// Find the line for a product.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: &ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| &l.product_id == product_id)
    }

    /// Add units of a product, incrementing an existing line or appending a new one.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::LineLimit`] (and changes nothing) when the
    /// line would exceed [`Quantity::MAX`].
    pub fn add(&mut self, product_id: ProductId, quantity: Quantity) -> Result<(), QuantityError> {
        match self.line_mut(&product_id) {
            Some(line) => {
                let next = line.quantity.saturating_add(quantity.get());
                if next > Quantity::MAX {
                    return Err(QuantityError::LineLimit {
                        current: line.quantity,
                        added: quantity.get(),
                        max: Quantity::MAX,
                    });
                }
                line.quantity = next;
            }
            None => self.lines.push(CartLine {
                product_id,
                quantity: quantity.get(),
            }),
        }
        Ok(())
    }

    /// Set the quantity of an existing line, clamped to [`Quantity::MAX`].
    ///
    /// Returns `false` (and changes nothing) when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        match self.line_mut(product_id) {
            Some(line) => {
                line.quantity = quantity.min(Quantity::MAX);
                true
            }
            None => false,
        }
    }

    /// Remove the line for a product.
    ///
    /// Returns `false` when the product was not in the cart.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.product_id != product_id);
        self.lines.len() != before
    }

    /// Fold every line of `other` into this snapshot, summing overlapping products.
    ///
    /// Zero-quantity lines carry nothing to merge and are skipped. A sum past
    /// [`Quantity::MAX`] is clamped rather than refused, so a merge never
    /// drops a line.
    pub fn absorb(&mut self, other: &Self) {
        for line in other.lines.iter().filter(|l| l.quantity > 0) {
            match self.line_mut(&line.product_id) {
                Some(existing) => existing.quantity = clamped_sum(existing.quantity, line.quantity),
                None => self.lines.push(CartLine {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity.min(Quantity::MAX),
                }),
            }
        }
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of all line quantities (the item badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Order-insensitive equality.
    #[must_use]
    pub fn same_lines(&self, other: &Self) -> bool {
        if self.lines.len() != other.lines.len() {
            return false;
        }
        self.lines
            .iter()
            .all(|line| other.line(&line.product_id) == Some(line))
    }
}

impl From<Vec<CartLine>> for CartSnapshot {
    fn from(lines: Vec<CartLine>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<CartSnapshot> for Vec<CartLine> {
    fn from(snapshot: CartSnapshot) -> Self {
        snapshot.lines
    }
}

impl FromIterator<CartLine> for CartSnapshot {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        Self::from_lines(iter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn pid(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[test]
    fn test_add_same_product_sums_into_one_line() {
        let mut cart = CartSnapshot::new();
        cart.add(pid("P1"), qty(2)).unwrap();
        cart.add(pid("P1"), qty(3)).unwrap();

        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.line(&pid("P1")).unwrap().quantity, 5);
    }

    #[test]
    fn test_add_many_sums_match_total() {
        let adds = [1, 4, 2, 7, 3];
        let mut cart = CartSnapshot::new();
        for n in adds {
            cart.add(pid("P1"), qty(n)).unwrap();
        }
        cart.add(pid("P2"), qty(1)).unwrap();

        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.line(&pid("P1")).unwrap().quantity, 17);
        assert_eq!(cart.total_quantity(), 18);
    }

    #[test]
    fn test_add_past_line_limit_is_refused() {
        let mut cart = CartSnapshot::new();
        cart.add(pid("P1"), qty(i64::from(Quantity::MAX))).unwrap();
        let before = cart.clone();

        assert_eq!(
            cart.add(pid("P1"), qty(1)),
            Err(QuantityError::LineLimit {
                current: Quantity::MAX,
                added: 1,
                max: Quantity::MAX,
            })
        );
        assert_eq!(cart, before);
    }

    #[test]
    fn test_absorb_clamps_at_line_limit() {
        let mut remote = CartSnapshot::from_lines([CartLine::new("P1", 6_000)]);
        let guest = CartSnapshot::from_lines([CartLine::new("P1", 6_000), CartLine::new("P2", 3)]);
        remote.absorb(&guest);

        assert_eq!(remote.line(&pid("P1")).unwrap().quantity, Quantity::MAX);
        assert_eq!(remote.line(&pid("P2")).unwrap().quantity, 3);
    }

    #[test]
    fn test_stored_oversized_lines_are_clamped() {
        let cart: CartSnapshot = serde_json::from_str(
            r#"[{"productId":"P1","quantity":9000},{"productId":"P1","quantity":9000},{"productId":"P2","quantity":20000}]"#,
        )
        .unwrap();
        assert_eq!(cart.line(&pid("P1")).unwrap().quantity, Quantity::MAX);
        assert_eq!(cart.line(&pid("P2")).unwrap().quantity, Quantity::MAX);
    }

    #[test]
    fn test_set_quantity_replaces() {
        let mut cart = CartSnapshot::from_lines([CartLine::new("P1", 5)]);
        assert!(cart.set_quantity(&pid("P1"), 2));
        assert_eq!(cart.line(&pid("P1")).unwrap().quantity, 2);
    }

    #[test]
    fn test_set_quantity_missing_is_noop() {
        let mut cart = CartSnapshot::from_lines([CartLine::new("P1", 5)]);
        let before = cart.clone();
        assert!(!cart.set_quantity(&pid("P9"), 2));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut cart = CartSnapshot::from_lines([CartLine::new("P1", 5)]);
        let before = cart.clone();
        assert!(!cart.remove(&pid("P9")));
        assert_eq!(cart, before);

        assert!(cart.remove(&pid("P1")));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_absorb_sums_overlap() {
        let mut remote = CartSnapshot::from_lines([CartLine::new("P1", 1), CartLine::new("P2", 2)]);
        let guest = CartSnapshot::from_lines([CartLine::new("P1", 5)]);
        remote.absorb(&guest);

        let expected = CartSnapshot::from_lines([CartLine::new("P2", 2), CartLine::new("P1", 6)]);
        assert!(remote.same_lines(&expected));
    }

    #[test]
    fn test_absorb_skips_zero_lines() {
        let mut remote = CartSnapshot::new();
        remote.absorb(&CartSnapshot::from_lines([CartLine::new("P1", 0)]));
        assert!(remote.is_empty());
    }

    #[test]
    fn test_same_lines_ignores_order() {
        let a = CartSnapshot::from_lines([CartLine::new("P1", 1), CartLine::new("P2", 2)]);
        let b = CartSnapshot::from_lines([CartLine::new("P2", 2), CartLine::new("P1", 1)]);
        assert!(a.same_lines(&b));
        assert_ne!(a, b);

        let c = CartSnapshot::from_lines([CartLine::new("P2", 3), CartLine::new("P1", 1)]);
        assert!(!a.same_lines(&c));
    }

    #[test]
    fn test_json_shape() {
        let cart = CartSnapshot::from_lines([CartLine::new("P1", 5)]);
        assert_eq!(
            serde_json::to_value(&cart).unwrap(),
            serde_json::json!([{ "productId": "P1", "quantity": 5 }])
        );
    }

    #[test]
    fn test_deserialize_folds_duplicates() {
        let cart: CartSnapshot = serde_json::from_str(
            r#"[{"productId":"P1","quantity":2},{"productId":"P1","quantity":3}]"#,
        )
        .unwrap();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.line(&pid("P1")).unwrap().quantity, 5);
    }
}
