use concord_core::Side;

/// Per-run record of which positions on each side already belong to a match
/// group. Claims only ever accumulate.
#[derive(Debug, Clone)]
pub struct ClaimState {
    bank: Vec<bool>,
    ledger: Vec<bool>,
}

impl ClaimState {
    pub fn new(bank_len: usize, ledger_len: usize) -> Self {
        Self {
            bank: vec![false; bank_len],
            ledger: vec![false; ledger_len],
        }
    }

    fn side(&self, side: Side) -> &[bool] {
        match side {
            Side::Bank => &self.bank,
            Side::Ledger => &self.ledger,
        }
    }

    pub fn is_claimed(&self, side: Side, pos: usize) -> bool {
        self.side(side).get(pos).copied().unwrap_or(false)
    }

    /// Claims every position of a group, or none of them if any is already
    /// taken. Returns whether the claim went through.
    pub fn claim_group(&mut self, bank: &[usize], ledger: &[usize]) -> bool {
        let free = bank.iter().all(|&p| self.bank.get(p) == Some(&false))
            && ledger.iter().all(|&p| self.ledger.get(p) == Some(&false));
        if !free {
            return false;
        }
        for &p in bank {
            self.bank[p] = true;
        }
        for &p in ledger {
            self.ledger[p] = true;
        }
        true
    }

    pub fn unclaimed(&self, side: Side) -> impl Iterator<Item = usize> + '_ {
        self.side(side)
            .iter()
            .enumerate()
            .filter(|(_, claimed)| !**claimed)
            .map(|(pos, _)| pos)
    }

    pub fn claimed_count(&self, side: Side) -> usize {
        self.side(side).iter().filter(|c| **c).count()
    }
}
