//! 256-bit unsigned fixed-point primitives: checked integer arithmetic and
//! the scaled exchange rate used by the order book.
//!
//! Four little-endian `u64` limbs, with checked operations that surface a
//! typed error instead of panicking on overflow.

use borsh_derive::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of `u64` limbs backing [`Uint256`], little-endian (limb 0 is
/// least significant).
const LIMBS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FixedPointError {
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivideByZero,
    #[error("total cost overflows uint256")]
    TotalCostOverflowsUint256,
    #[error("total cost is less than one nano")]
    TotalCostIsLessThanOneNano,
    #[error("invalid exchange rate string: {0}")]
    InvalidExchangeRate(String),
}

/// A 256-bit unsigned integer with checked (never-panicking) arithmetic.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Uint256([u64; LIMBS]);

impl Uint256 {
    pub const ZERO: Uint256 = Uint256([0; LIMBS]);

    pub fn from_limbs(limbs: [u64; LIMBS]) -> Self {
        Self(limbs)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&l| l == 0)
    }

    /// Big-endian 32-byte encoding, per the canonical wire/key format.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for i in 0..LIMBS {
            let be = self.0[i].to_be_bytes();
            let offset = (LIMBS - 1 - i) * 8;
            out[offset..offset + 8].copy_from_slice(&be);
        }
        out
    }

    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        let mut limbs = [0u64; LIMBS];
        for i in 0..LIMBS {
            let offset = (LIMBS - 1 - i) * 8;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[offset..offset + 8]);
            limbs[i] = u64::from_be_bytes(buf);
        }
        Self(limbs)
    }

    pub fn checked_add(&self, rhs: &Uint256) -> Result<Uint256, FixedPointError> {
        let mut out = [0u64; LIMBS];
        let mut carry = 0u64;
        for i in 0..LIMBS {
            let (sum, c1) = self.0[i].overflowing_add(rhs.0[i]);
            let (sum, c2) = sum.overflowing_add(carry);
            out[i] = sum;
            carry = (c1 as u64) + (c2 as u64);
        }
        if carry != 0 {
            return Err(FixedPointError::Overflow);
        }
        Ok(Uint256(out))
    }

    pub fn checked_sub(&self, rhs: &Uint256) -> Result<Uint256, FixedPointError> {
        let mut out = [0u64; LIMBS];
        let mut borrow = 0i128;
        for i in 0..LIMBS {
            let diff = self.0[i] as i128 - rhs.0[i] as i128 - borrow;
            if diff < 0 {
                out[i] = (diff + (1i128 << 64)) as u64;
                borrow = 1;
            } else {
                out[i] = diff as u64;
                borrow = 0;
            }
        }
        if borrow != 0 {
            return Err(FixedPointError::Overflow);
        }
        Ok(Uint256(out))
    }

    pub fn checked_mul(&self, rhs: &Uint256) -> Result<Uint256, FixedPointError> {
        let mut wide = [0u64; LIMBS * 2];
        for i in 0..LIMBS {
            if self.0[i] == 0 {
                continue;
            }
            let mut carry = 0u128;
            for j in 0..LIMBS {
                let idx = i + j;
                let product = (self.0[i] as u128) * (rhs.0[j] as u128) + (wide[idx] as u128) + carry;
                wide[idx] = product as u64;
                carry = product >> 64;
            }
            let mut idx = i + LIMBS;
            while carry != 0 {
                let sum = wide[idx] as u128 + carry;
                wide[idx] = sum as u64;
                carry = sum >> 64;
                idx += 1;
            }
        }
        if wide[LIMBS..].iter().any(|&l| l != 0) {
            return Err(FixedPointError::Overflow);
        }
        let mut out = [0u64; LIMBS];
        out.copy_from_slice(&wide[..LIMBS]);
        Ok(Uint256(out))
    }

    pub fn checked_div(&self, rhs: &Uint256) -> Result<Uint256, FixedPointError> {
        if rhs.is_zero() {
            return Err(FixedPointError::DivideByZero);
        }
        if self.lt(rhs) {
            return Ok(Uint256::ZERO);
        }
        // Bit-by-bit long division: correct, not fast. 256 shift/subtract steps.
        let mut quotient = Uint256::ZERO;
        let mut remainder = Uint256::ZERO;
        for bit in (0..256u32).rev() {
            remainder = remainder.shl1();
            if self.bit(bit) {
                remainder.0[0] |= 1;
            }
            if !remainder.lt(rhs) {
                remainder = remainder.checked_sub(rhs).expect("remainder >= rhs checked above");
                quotient.set_bit(bit);
            }
        }
        Ok(quotient)
    }

    fn bit(&self, index: u32) -> bool {
        let limb = (index / 64) as usize;
        let offset = index % 64;
        (self.0[limb] >> offset) & 1 == 1
    }

    fn set_bit(&mut self, index: u32) {
        let limb = (index / 64) as usize;
        let offset = index % 64;
        self.0[limb] |= 1 << offset;
    }

    fn shl1(&self) -> Uint256 {
        let mut out = [0u64; LIMBS];
        let mut carry = 0u64;
        for i in 0..LIMBS {
            out[i] = (self.0[i] << 1) | carry;
            carry = self.0[i] >> 63;
        }
        Uint256(out)
    }

    pub fn lt(&self, other: &Uint256) -> bool {
        for i in (0..LIMBS).rev() {
            if self.0[i] != other.0[i] {
                return self.0[i] < other.0[i];
            }
        }
        false
    }

    pub fn gt(&self, other: &Uint256) -> bool {
        other.lt(self)
    }
}

impl PartialEq for Uint256 {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Uint256 {}

impl PartialOrd for Uint256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Uint256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        for i in (0..LIMBS).rev() {
            match self.0[i].cmp(&other.0[i]) {
                std::cmp::Ordering::Equal => continue,
                ord => return ord,
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl std::hash::Hash for Uint256 {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl From<u64> for Uint256 {
    fn from(v: u64) -> Self {
        Self([v, 0, 0, 0])
    }
}

impl fmt::Display for Uint256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut digits = Vec::new();
        let mut n = *self;
        let ten = Uint256::from(10u64);
        while !n.is_zero() {
            let q = n.checked_div(&ten).expect("ten is nonzero");
            let r = n.checked_sub(&q.checked_mul(&ten).expect("bounded product")).expect("r <= n");
            digits.push((r.0[0] % 10) as u8);
            n = q;
        }
        for d in digits.iter().rev() {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

/// Number of decimal places the scaled exchange rate is fixed at:
/// `scaled = floor(rate * 10^38)`.
pub const EXCHANGE_RATE_SCALE_FACTOR_DECIMALS: u32 = 38;

/// `floor(rate * 10^38)` stored as a `Uint256`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ScaledExchangeRate(pub Uint256);

impl ScaledExchangeRate {
    pub const ZERO: ScaledExchangeRate = ScaledExchangeRate(Uint256::ZERO);

    /// A zero rate denotes a market order.
    pub fn is_market_order(&self) -> bool {
        self.0.is_zero()
    }

    /// Parses a decimal string (e.g. "12.5") into a scaled rate. An empty
    /// string yields zero. Missing fractional digits are filled with zero;
    /// an integer part that would overflow after scaling is an error.
    pub fn parse_decimal(input: &str) -> Result<ScaledExchangeRate, FixedPointError> {
        if input.is_empty() {
            return Ok(ScaledExchangeRate::ZERO);
        }
        let (int_part, frac_part) = match input.split_once('.') {
            Some((i, f)) => (i, f),
            None => (input, ""),
        };
        if frac_part.len() > EXCHANGE_RATE_SCALE_FACTOR_DECIMALS as usize {
            return Err(FixedPointError::InvalidExchangeRate(input.to_string()));
        }
        let int_val: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| FixedPointError::InvalidExchangeRate(input.to_string()))?
        };
        let padded_frac = format!("{:0<width$}", frac_part, width = EXCHANGE_RATE_SCALE_FACTOR_DECIMALS as usize);
        let frac_val: u128 = if padded_frac.is_empty() {
            0
        } else {
            padded_frac.parse().map_err(|_| FixedPointError::InvalidExchangeRate(input.to_string()))?
        };

        let scale = pow10_uint256(EXCHANGE_RATE_SCALE_FACTOR_DECIMALS);
        let int_scaled = Uint256::from(int_val)
            .checked_mul(&scale)
            .map_err(|_| FixedPointError::InvalidExchangeRate(input.to_string()))?;
        let combined = int_scaled
            .checked_add(&frac_to_uint256(frac_val))
            .map_err(|_| FixedPointError::InvalidExchangeRate(input.to_string()))?;
        Ok(ScaledExchangeRate(combined))
    }

    /// `floor(quantity_to_buy * scaled_rate / 10^38)`.
    pub fn total_cost(&self, quantity_to_buy: &Uint256) -> Result<Uint256, FixedPointError> {
        let scale = pow10_uint256(EXCHANGE_RATE_SCALE_FACTOR_DECIMALS);
        let product = quantity_to_buy.checked_mul(&self.0).map_err(|_| FixedPointError::TotalCostOverflowsUint256)?;
        let cost = product.checked_div(&scale).map_err(|_| FixedPointError::TotalCostOverflowsUint256)?;
        if cost.is_zero() && !quantity_to_buy.is_zero() {
            return Err(FixedPointError::TotalCostIsLessThanOneNano);
        }
        Ok(cost)
    }

    /// Inverse of [`total_cost`](Self::total_cost): the largest quantity
    /// whose `total_cost` does not exceed `max_output`, i.e.
    /// `floor(max_output * 10^38 / rate)`. Used by the matching engine to
    /// bound a fill by a counterparty's remaining inventory without ever
    /// multiplying two rates together (which would overflow `Uint256` at
    /// this scale).
    pub fn max_quantity_for_budget(&self, max_output: &Uint256) -> Result<Uint256, FixedPointError> {
        if self.0.is_zero() {
            return Err(FixedPointError::InvalidExchangeRate("cannot invert a market (zero) rate".to_string()));
        }
        let scale = pow10_uint256(EXCHANGE_RATE_SCALE_FACTOR_DECIMALS);
        let scaled_budget =
            max_output.checked_mul(&scale).map_err(|_| FixedPointError::TotalCostOverflowsUint256)?;
        scaled_budget.checked_div(&self.0)
    }

    /// Whether a resting order priced at `self` satisfies an incoming
    /// order's limit of `taker_rate`. A matched pair's rates are expressed
    /// in each order's own buying/selling labels, which are swapped
    /// relative to each other — so they're reciprocals of the same
    /// underlying price, not directly comparable. The dimensionally
    /// correct crossing test is `self * taker_rate >= 1` (scaled), the
    /// usual "ask <= bid" condition after clearing denominators. A market
    /// (zero-rate) taker always crosses.
    pub fn crosses(&self, taker_rate: &ScaledExchangeRate) -> bool {
        if taker_rate.is_market_order() {
            return true;
        }
        match self.0.checked_mul(&taker_rate.0) {
            Ok(product) => !product.lt(&rate_product_threshold()),
            Err(_) => true,
        }
    }
}

fn rate_product_threshold() -> Uint256 {
    pow10_uint256(EXCHANGE_RATE_SCALE_FACTOR_DECIMALS * 2)
}

fn pow10_uint256(exp: u32) -> Uint256 {
    let mut out = Uint256::from(1u64);
    let ten = Uint256::from(10u64);
    for _ in 0..exp {
        out = out.checked_mul(&ten).expect("10^38 fits in uint256");
    }
    out
}

/// `frac_val` is the fully zero-padded 38-digit fractional numerator, so it
/// represents the scaled fractional contribution directly.
fn frac_to_uint256(frac_val: u128) -> Uint256 {
    let lo = frac_val as u64;
    let hi = (frac_val >> 64) as u64;
    Uint256([lo, hi, 0, 0])
}
