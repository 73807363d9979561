/// Percentage of bits that differ between the planted and the inferred bytes.
pub fn compute_ber(original_data: &[u8], exfiltrated_data: &[u8]) -> f64 {
    let original_data_bits = original_data.len() * 8;
    if original_data_bits == 0 {
        return 0.0;
    }
    let mut error_bits = 0;

    for (orig_byte, exfil_byte) in original_data.iter().zip(exfiltrated_data) {
        let diff = orig_byte ^ exfil_byte;
        error_bits += diff.count_ones();
    }

    100.0 * error_bits as f64 / original_data_bits as f64
}

/// Planted and inferred bytes of a series of trials.
#[derive(Debug, Default, Clone)]
pub struct Tally {
    planted: Vec<u8>,
    inferred: Vec<u8>,
}

impl Tally {
    pub fn record(&mut self, planted: u8, inferred: u8) {
        self.planted.push(planted);
        self.inferred.push(inferred);
    }

    pub fn trials(&self) -> usize {
        self.planted.len()
    }

    pub fn correct(&self) -> usize {
        self.planted
            .iter()
            .zip(&self.inferred)
            .filter(|(p, i)| p == i)
            .count()
    }

    pub fn success_rate(&self) -> f64 {
        if self.trials() == 0 {
            return 0.0;
        }
        self.correct() as f64 / self.trials() as f64
    }

    pub fn ber(&self) -> f64 {
        compute_ber(&self.planted, &self.inferred)
    }
}
