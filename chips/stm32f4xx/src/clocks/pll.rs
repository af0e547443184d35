// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Main PLL frequency planning.
//!
//! Turns a desired system clock frequency into PLL factors with a 1 MHz
//! precision:
//!
//! + M brings the source down to a 2 MHz VCO input when the source frequency
//!   is even, 1 MHz otherwise
//! + P is chosen so that the VCO output lands in its 100-432 MHz range
//! + N follows from the two
//! + Q keeps the 48 MHz clock (USB OTG FS, SDIO, RNG) at or below 48 MHz
//!
//! ```rust,ignore
//! // 168 MHz from the 16 MHz HSI: M = 8, N = 168, P = 2, Q = 7
//! let config = pll::compute_pll_config::<Stm32f429Specs>(PllSource::HSI, 16, 168)?;
//! ```

use crate::chip_specific::clock_constants::PllConstants;
use crate::rcc::{PllConfig, PllSource, PLLP};

use kernel::ErrorCode;

const PLL48_FREQUENCY_MHZ: usize = 48;

fn compute_pllm(source_frequency_mhz: usize) -> Result<u8, ErrorCode> {
    let pllm = if source_frequency_mhz % 2 == 0 {
        source_frequency_mhz / 2
    } else {
        source_frequency_mhz
    };
    if (2..=63).contains(&pllm) {
        Ok(pllm as u8)
    } else {
        Err(ErrorCode::INVAL)
    }
}

pub(crate) fn compute_pllp(desired_frequency_mhz: usize) -> PLLP {
    if desired_frequency_mhz < 55 {
        PLLP::DivideBy8
    } else if desired_frequency_mhz < 73 {
        PLLP::DivideBy6
    } else if desired_frequency_mhz < 109 {
        PLLP::DivideBy4
    } else {
        PLLP::DivideBy2
    }
}

fn compute_plln(desired_frequency_mhz: usize, vco_input_frequency_mhz: usize, pllp: PLLP) -> usize {
    desired_frequency_mhz * usize::from(pllp) / vco_input_frequency_mhz
}

fn compute_pllq(vco_output_frequency_mhz: usize) -> u8 {
    let pllq = vco_output_frequency_mhz.div_ceil(PLL48_FREQUENCY_MHZ);
    pllq.clamp(2, 15) as u8
}

/// Compute the PLL factors for `desired_frequency_mhz` from a source running
/// at `source_frequency_mhz`.
///
/// # Errors
///
/// + [Err]\([ErrorCode::INVAL]\): if the desired frequency is outside the part's PLL range or the
///   source frequency cannot be divided into the VCO input range
pub fn compute_pll_config<Constants: PllConstants>(
    source: PllSource,
    source_frequency_mhz: usize,
    desired_frequency_mhz: usize,
) -> Result<PllConfig, ErrorCode> {
    if desired_frequency_mhz < Constants::MIN_FREQ_MHZ
        || desired_frequency_mhz > Constants::MAX_FREQ_MHZ
    {
        return Err(ErrorCode::INVAL);
    }

    let m = compute_pllm(source_frequency_mhz)?;
    let vco_input_frequency_mhz = source_frequency_mhz / m as usize;
    let p = compute_pllp(desired_frequency_mhz);
    let n = compute_plln(desired_frequency_mhz, vco_input_frequency_mhz, p);

    Ok(PllConfig {
        source,
        m,
        n: n as u16,
        p,
        q: compute_pllq(n * vco_input_frequency_mhz),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip_specific::{Stm32f401Specs, Stm32f429Specs};

    #[test]
    fn hsi_168mhz() {
        assert_eq!(
            Ok(PllConfig {
                source: PllSource::HSI,
                m: 8,
                n: 168,
                p: PLLP::DivideBy2,
                q: 7,
            }),
            compute_pll_config::<Stm32f429Specs>(PllSource::HSI, 16, 168)
        );
    }

    #[test]
    fn odd_source_uses_1mhz_vco_input() {
        let config = compute_pll_config::<Stm32f429Specs>(PllSource::HSE, 25, 100).unwrap();
        assert_eq!(25, config.m);
        assert_eq!(PLLP::DivideBy4, config.p);
        assert_eq!(400, config.n);
        assert_eq!(9, config.q);
    }

    #[test]
    fn low_frequencies_use_large_p() {
        let config = compute_pll_config::<Stm32f429Specs>(PllSource::HSE, 8, 13).unwrap();
        assert_eq!(4, config.m);
        assert_eq!(PLLP::DivideBy8, config.p);
        assert_eq!(52, config.n);
        assert_eq!(3, config.q);
    }

    #[test]
    fn out_of_range_requests() {
        assert_eq!(
            Err(ErrorCode::INVAL),
            compute_pll_config::<Stm32f401Specs>(PllSource::HSI, 16, 20)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            compute_pll_config::<Stm32f429Specs>(PllSource::HSI, 16, 217)
        );
        assert_eq!(
            Err(ErrorCode::INVAL),
            compute_pll_config::<Stm32f429Specs>(PllSource::HSE, 1, 100)
        );
    }
}
