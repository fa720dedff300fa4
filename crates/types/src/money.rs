/// Monetary amounts in integer minor units (centavos).
///
/// Signed so running balances can go negative (overpayment credit is a
/// valid billing state); individual posted amounts are validated positive
/// at the ledger boundary.
pub type AmountMinor = i64;
