use super::RandomImpl;

/// Marsaglia polar method with one cached value, as `java.util.Random` does.
pub trait GaussianGenerator: RandomImpl {
    fn stored_next_gaussian(&self) -> Option<f64>;

    fn set_stored_next_gaussian(&mut self, value: Option<f64>);

    fn calculate_gaussian(&mut self) -> f64 {
        if let Some(gaussian) = self.stored_next_gaussian() {
            self.set_stored_next_gaussian(None);
            return gaussian;
        }
        loop {
            let x = self.next_f64() * 2.0 - 1.0;
            let y = self.next_f64() * 2.0 - 1.0;
            let s = x * x + y * y;

            if s < 1.0 && s != 0.0 {
                let scale = (-2.0 * s.ln() / s).sqrt();
                self.set_stored_next_gaussian(Some(y * scale));
                return x * scale;
            }
        }
    }
}
