//! Dataset generation for the semi-join benchmark.
//!
//! Users get dense ids `1..=n`. Orders reference either a sampled real user
//! or a synthetic id near `i32::MAX` that no user can have, in proportions
//! set by the selectivity.

use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::validate_selectivity;
use crate::error::{Error, Result};

/// Upper bound for synthetic, never-matching user ids (exclusive).
pub const MAX_ID: i32 = i32::MAX;

/// Range order amounts are drawn from.
pub const AMOUNT_RANGE: std::ops::Range<f64> = 10.0..500_000.0;

/// A user row.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

impl User {
    /// Pipe-delimited record used as the key-value payload.
    pub fn to_record(&self) -> String {
        format!("{}|{}|{}", self.user_id, self.username, self.email)
    }
}

/// An order row.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: i32,
    pub user_id: i32,
    pub order_date: NaiveDateTime,
    pub amount: f64,
}

impl Order {
    /// Pipe-delimited record used as the key-value payload.
    pub fn to_record(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.order_id, self.user_id, self.order_date, self.amount
        )
    }
}

/// Users and orders generated for one run.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub users: Vec<User>,
    pub orders: Vec<Order>,
    /// Number of orders whose `user_id` belongs to a generated user.
    pub matching: usize,
}

/// Number of orders that reference an existing user.
pub fn matching_count(n: usize, selectivity: f64) -> usize {
    (n as f64 * selectivity).floor() as usize
}

/// Randomized record generator.
pub struct DatasetGenerator {
    rng: StdRng,
}

impl DatasetGenerator {
    /// Create a generator with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create a generator seeded from the OS.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Generate `n` users with ids `1..=n`.
    pub fn generate_users(&mut self, n: usize) -> Vec<User> {
        (1..=n as i32)
            .map(|user_id| User {
                user_id,
                username: format!("user_{}", user_id),
                email: format!("user_{}@example.com", user_id),
            })
            .collect()
    }

    /// Generate `n` orders, `floor(n * selectivity)` of which reference an
    /// id from `user_ids`.
    pub fn generate_orders(
        &mut self,
        n: usize,
        selectivity: f64,
        user_ids: &[i32],
    ) -> Result<Vec<Order>> {
        validate_selectivity(selectivity)?;

        let matching = matching_count(n, selectivity);
        let non_matching = n - matching;

        if matching > user_ids.len() {
            return Err(Error::Config(format!(
                "{} matching orders requested but only {} users exist",
                matching,
                user_ids.len()
            )));
        }

        // Synthetic ids occupy [MAX_ID - non_matching, MAX_ID).
        let synthetic_floor = MAX_ID as i64 - non_matching as i64;
        if non_matching > 0 && user_ids.iter().any(|&id| id as i64 >= synthetic_floor) {
            return Err(Error::Config(format!(
                "user ids reach into the synthetic range starting at {}",
                synthetic_floor
            )));
        }

        let mut pool: Vec<i32> = user_ids.to_vec();
        let (sampled, _) = pool.partial_shuffle(&mut self.rng, matching);
        let mut order_user_ids: Vec<i32> = Vec::with_capacity(n);
        order_user_ids.extend_from_slice(sampled);
        order_user_ids.extend((1..=non_matching as i32).map(|k| MAX_ID - k));
        order_user_ids.shuffle(&mut self.rng);

        let orders = order_user_ids
            .into_iter()
            .zip(1..=n as i32)
            .map(|(user_id, order_id)| Order {
                order_id,
                user_id,
                order_date: Local::now().naive_local(),
                amount: self.rng.gen_range(AMOUNT_RANGE),
            })
            .collect();

        Ok(orders)
    }

    /// Generate `n` users and `n` orders at the given selectivity.
    pub fn generate(&mut self, n: usize, selectivity: f64) -> Result<Dataset> {
        let users = self.generate_users(n);
        let user_ids: Vec<i32> = users.iter().map(|u| u.user_id).collect();
        let orders = self.generate_orders(n, selectivity, &user_ids)?;

        Ok(Dataset {
            users,
            orders,
            matching: matching_count(n, selectivity),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn count_matching(dataset: &Dataset) -> usize {
        let ids: HashSet<i32> = dataset.users.iter().map(|u| u.user_id).collect();
        dataset
            .orders
            .iter()
            .filter(|o| ids.contains(&o.user_id))
            .count()
    }

    #[test]
    fn test_generate_users() {
        let users = DatasetGenerator::new(1).generate_users(100);
        assert_eq!(users.len(), 100);
        assert_eq!(users[0].user_id, 1);
        assert_eq!(users[99].user_id, 100);
        assert_eq!(users[4].to_record(), "5|user_5|user_5@example.com");
    }

    #[test]
    fn test_matching_count_is_exact() {
        for &(n, selectivity) in &[
            (1, 0.0),
            (1, 1.0),
            (1, 0.5),
            (7, 0.5),
            (1000, 0.5),
            (1000, 0.333),
            (999, 0.999),
            (25, 1.0),
        ] {
            let dataset = DatasetGenerator::new(42).generate(n, selectivity).unwrap();
            let expected = (n as f64 * selectivity).floor() as usize;
            assert_eq!(count_matching(&dataset), expected, "n={} s={}", n, selectivity);
            assert_eq!(dataset.matching, expected);
            assert_eq!(dataset.orders.len(), n);
        }
    }

    #[test]
    fn test_non_matching_ids_never_intersect_users() {
        let dataset = DatasetGenerator::new(3).generate(500, 0.2).unwrap();
        let ids: HashSet<i32> = dataset.users.iter().map(|u| u.user_id).collect();
        let synthetic: Vec<i32> = dataset
            .orders
            .iter()
            .map(|o| o.user_id)
            .filter(|id| *id > 500)
            .collect();

        assert_eq!(synthetic.len(), 400);
        assert!(synthetic.iter().all(|id| !ids.contains(id)));
        assert!(synthetic.iter().all(|id| *id < MAX_ID));
    }

    #[test]
    fn test_matching_ids_are_sampled_without_replacement() {
        let dataset = DatasetGenerator::new(9).generate(1000, 1.0).unwrap();
        let referenced: HashSet<i32> = dataset.orders.iter().map(|o| o.user_id).collect();
        assert_eq!(referenced.len(), 1000);
    }

    #[test]
    fn test_order_ids_are_dense() {
        let dataset = DatasetGenerator::new(5).generate(250, 0.5).unwrap();
        let ids: Vec<i32> = dataset.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, (1..=250).collect::<Vec<_>>());
    }

    #[test]
    fn test_amounts_in_range() {
        let dataset = DatasetGenerator::new(11).generate(200, 0.5).unwrap();
        assert!(dataset
            .orders
            .iter()
            .all(|o| o.amount >= 10.0 && o.amount < 500_000.0));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let a = DatasetGenerator::new(77).generate(100, 0.5).unwrap();
        let b = DatasetGenerator::new(77).generate(100, 0.5).unwrap();
        let ua: Vec<i32> = a.orders.iter().map(|o| o.user_id).collect();
        let ub: Vec<i32> = b.orders.iter().map(|o| o.user_id).collect();
        assert_eq!(ua, ub);
    }

    #[test]
    fn test_matching_and_non_matching_are_interleaved() {
        let dataset = DatasetGenerator::new(13).generate(1000, 0.5).unwrap();
        let first_half_matching = dataset.orders[..500]
            .iter()
            .filter(|o| o.user_id <= 1000)
            .count();
        assert!(first_half_matching > 0 && first_half_matching < 500);
    }

    #[test]
    fn test_rejects_invalid_selectivity() {
        let mut gen = DatasetGenerator::new(1);
        assert!(gen.generate_orders(10, -0.1, &[1, 2, 3]).is_err());
        assert!(gen.generate_orders(10, 1.1, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_rejects_more_matches_than_users() {
        let mut gen = DatasetGenerator::new(1);
        let err = gen.generate_orders(10, 1.0, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_user_ids_in_synthetic_range() {
        let mut gen = DatasetGenerator::new(1);
        assert!(gen.generate_orders(2, 0.5, &[MAX_ID - 1]).is_err());
    }

    #[test]
    fn test_order_record_format() {
        let order = Order {
            order_id: 3,
            user_id: 8,
            order_date: NaiveDateTime::parse_from_str("2025-01-02 03:04:05", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            amount: 12.5,
        };
        assert_eq!(order.to_record(), "3|8|2025-01-02 03:04:05|12.5");
    }
}
