use std::fmt;

use super::element::Element;

/// Canonical key for an atom's local chemical environment: the element plus
/// the ascending multiset of its bond orders, rounded to integers ≥ 1.
///
/// Two atoms with equal element and equal sorted bond-order multisets belong
/// to the same class regardless of step or atom id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    element: Element,
    orders: Vec<u8>,
}

impl Fingerprint {
    /// Builds the canonical key from raw (possibly fractional) bond orders.
    ///
    /// Orders are rounded to the nearest integer, floored at 1, and sorted,
    /// so construction order never affects equality.
    pub fn new(element: Element, raw_orders: &[f64]) -> Self {
        let mut orders: Vec<u8> = raw_orders
            .iter()
            .map(|&o| (o.round().max(1.0) as u8))
            .collect();
        orders.sort_unstable();
        Self { element, orders }
    }

    /// Builds the key from already-integer orders (perceived bonds).
    pub fn from_integer_orders(element: Element, raw_orders: &[u8]) -> Self {
        let mut orders: Vec<u8> = raw_orders.iter().map(|&o| o.max(1)).collect();
        orders.sort_unstable();
        Self { element, orders }
    }

    #[inline]
    pub fn element(&self) -> Element {
        self.element
    }

    /// Sorted bond orders of the class.
    #[inline]
    pub fn orders(&self) -> &[u8] {
        &self.orders
    }
}

/// Rendered as the element symbol followed by the sorted orders, e.g. `C112`
/// for a carbon with two single bonds and one double bond. Safe for use in
/// file names.
impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element)?;
        for order in &self.orders {
            write!(f, "{}", order)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_for_permuted_orders() {
        let a = Fingerprint::new(Element::C, &[1.0, 2.0, 1.0]);
        let b = Fingerprint::new(Element::C, &[2.0, 1.0, 1.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_by_element_or_multiset() {
        let c = Fingerprint::new(Element::C, &[1.0, 1.0]);
        let n = Fingerprint::new(Element::N, &[1.0, 1.0]);
        let c3 = Fingerprint::new(Element::C, &[1.0, 1.0, 1.0]);
        assert_ne!(c, n);
        assert_ne!(c, c3);
    }

    #[test]
    fn rounds_and_floors_raw_orders() {
        let fp = Fingerprint::new(Element::O, &[0.3, 1.4, 1.6]);
        assert_eq!(fp.orders(), &[1, 1, 2]);
    }

    #[test]
    fn displays_element_and_orders() {
        let fp = Fingerprint::new(Element::C, &[2.0, 1.0, 1.0]);
        assert_eq!(fp.to_string(), "C112");

        let bare = Fingerprint::new(Element::H, &[]);
        assert_eq!(bare.to_string(), "H");
    }
}
