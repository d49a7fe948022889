use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One context's Pitman-Yor "restaurant": table occupancies per word, plus
/// stop/pass counters used only by the variable-order extension.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    tables: HashMap<String, Vec<u32>>,
    customer_count: HashMap<String, u32>,
    total_customer_count: u32,
    total_table_count_for_customer: HashMap<String, u32>,
    total_table_count: u32,
    pub stop: u32,
    pub pass: u32,
}

impl Restaurant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables_for(&self, word: &str) -> &[u32] {
        self.tables.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn table_count_for(&self, word: &str) -> u32 {
        self.total_table_count_for_customer.get(word).copied().unwrap_or(0)
    }

    pub fn customer_count_for(&self, word: &str) -> u32 {
        self.customer_count.get(word).copied().unwrap_or(0)
    }

    pub fn total_customer_count(&self) -> u32 {
        self.total_customer_count
    }

    pub fn total_table_count(&self) -> u32 {
        self.total_table_count
    }

    pub fn words(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }

    /// Seats one customer of `word` at table `k` (creating a new table if `k`
    /// is one past the current table count). Returns whether a new table was
    /// created.
    pub fn add_customer(&mut self, word: &str, k: usize) -> bool {
        let table_count = self.table_count_for(word) as usize;
        let mut added_table = false;
        if k < table_count {
            let tables = self.tables.get_mut(word).expect("table vector must exist");
            tables[k] += 1;
        } else {
            assert_eq!(k, table_count, "add_customer: table index out of order");
            self.tables.entry(word.to_string()).or_default().push(1);
            *self.total_table_count_for_customer.entry(word.to_string()).or_insert(0) += 1;
            self.total_table_count += 1;
            added_table = true;
        }
        *self.customer_count.entry(word.to_string()).or_insert(0) += 1;
        self.total_customer_count += 1;
        added_table
    }

    /// Removes one customer of `word` from table `k`. Returns
    /// `(removed_table, restaurant_now_empty)`.
    pub fn remove_customer(&mut self, word: &str, k: usize) -> (bool, bool) {
        let tables = self
            .tables
            .get_mut(word)
            .unwrap_or_else(|| panic!("remove_customer: word {word:?} has no tables"));
        assert!(
            tables[k] > 0,
            "remove_customer: table {k} for word {word:?} already empty"
        );
        tables[k] -= 1;
        *self.customer_count.get_mut(word).expect("customer_count missing") -= 1;
        self.total_customer_count -= 1;

        let mut removed_table = false;
        let mut restaurant_empty = false;
        if tables[k] == 0 {
            tables.remove(k);
            *self
                .total_table_count_for_customer
                .get_mut(word)
                .expect("table count missing") -= 1;
            self.total_table_count -= 1;
            removed_table = true;
            if self.total_table_count == 0 {
                restaurant_empty = true;
            }
        }
        if self.tables.get(word).map(Vec::is_empty).unwrap_or(false) {
            self.tables.remove(word);
            self.customer_count.remove(word);
            self.total_table_count_for_customer.remove(word);
        }
        (removed_table, restaurant_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_remove_is_symmetric() {
        let mut r = Restaurant::new();
        assert!(r.add_customer("abc", 0));
        assert_eq!(r.customer_count_for("abc"), 1);
        assert_eq!(r.total_table_count(), 1);
        let (removed_table, empty) = r.remove_customer("abc", 0);
        assert!(removed_table);
        assert!(empty);
        assert_eq!(r.customer_count_for("abc"), 0);
        assert_eq!(r.total_customer_count(), 0);
    }

    #[test]
    fn second_customer_can_join_existing_table() {
        let mut r = Restaurant::new();
        r.add_customer("abc", 0);
        let added = r.add_customer("abc", 0);
        assert!(!added);
        assert_eq!(r.customer_count_for("abc"), 2);
        assert_eq!(r.total_table_count(), 1);
    }
}
