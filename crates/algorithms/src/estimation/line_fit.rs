//! Ordinary least squares fit of a single line

/// Relative tolerance below which the input variance counts as vanished
const DEGENERATE_TOLERANCE: f64 = 1e-12;

/// `y = slope * x + intercept`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// The fit fell back to a constant (no input variance or no finite pairs)
    pub degenerate: bool,
}

impl LineFit {
    /// Evaluate the line at `x`
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        x * self.slope + self.intercept
    }
}

/// Fit `y = slope * x + intercept` by ordinary least squares.
///
/// Pairs where either value is not finite are skipped. Sums are taken over
/// values shifted by the first finite pair, which keeps exactly
/// representable linear data exact.
///
/// - No finite pairs: slope 0, intercept NaN.
/// - Vanishing input variance: slope 0, intercept = mean of `y`.
///
/// Both fallbacks are flagged as `degenerate`.
pub fn fit_line<I>(pairs: I) -> LineFit
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut finite = pairs.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite());

    let Some((x0, y0)) = finite.next() else {
        return LineFit {
            slope: 0.0,
            intercept: f64::NAN,
            degenerate: true,
        };
    };

    let (mut n, mut sx, mut sy, mut sxx, mut sxy) = (1.0_f64, 0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in finite {
        let dx = x - x0;
        let dy = y - y0;
        n += 1.0;
        sx += dx;
        sy += dy;
        sxx += dx * dx;
        sxy += dx * dy;
    }

    let denom = n * sxx - sx * sx;
    if denom <= DEGENERATE_TOLERANCE * n * sxx {
        return LineFit {
            slope: 0.0,
            intercept: y0 + sy / n,
            degenerate: true,
        };
    }

    let slope = (n * sxy - sx * sy) / denom;
    let shifted_intercept = (sy - slope * sx) / n;
    LineFit {
        slope,
        intercept: (y0 - slope * x0) + shifted_intercept,
        degenerate: false,
    }
}
