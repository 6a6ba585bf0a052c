//! Known fiat currencies, verifier platforms and token unit conversions.

use alloy_primitives::{Address, B256, U256};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// USDC has 6 decimals.
pub const USDC_DECIMALS: u32 = 6;
/// Conversion rates are 18-decimal fixed point.
pub const RATE_DECIMALS: u32 = 18;

const CURRENCIES: &[(&str, &str)] = &[
    ("0x4dab77a640748de8588de6834d814a344372b205265984b969f3e97060955bfa", "AED"),
    ("0xcb83cbb58eaa5007af6cad99939e4581c1e1b50d65609c30f303983301524ef3", "AUD"),
    ("0x221012e06ebf59a20b82e3003cf5d6ee973d9008bdb6e2f604faa89a27235522", "CAD"),
    ("0xc9d84274fd58aa177cabff54611546051b74ad658b939babaad6282500300d36", "CHF"),
    ("0xfaaa9c7b2f09d6a1b0971574d43ca62c3e40723167c09830ec33f06cec921381", "CNY"),
    ("0xfff16d60be267153303bbfa66e593fb8d06e24ea5ef24b6acca5224c2ca6b907", "EUR"),
    ("0x90832e2dc3221e4d56977c1aa8f6a6706b9ad6542fbbdaac13097d0fa5e42e67", "GBP"),
    ("0xa156dad863111eeb529c4b3a2a30ad40e6dcff3b27d8f282f82996e58eee7e7d", "HKD"),
    ("0xc681c4652bae8bd4b59bec1cdb90f868d93cc9896af9862b196843f54bf254b3", "IDR"),
    ("0x313eda7ae1b79890307d32a78ed869290aeb24cc0e8605157d7e7f5a69fea425", "ILS"),
    ("0xfe13aafd831cb225dfce3f6431b34b5b17426b6bff4fccabe4bbe0fe4adc0452", "JPY"),
    ("0x589be49821419c9c2fbb26087748bf3420a5c13b45349828f5cac24c58bbaa7b", "KES"),
    ("0xa94b0702860cb929d0ee0c60504dd565775a058bf1d2a2df074c1db0a66ad582", "MXN"),
    ("0xf20379023279e1d79243d2c491be8632c07cfb116be9d8194013fb4739461b84", "MYR"),
    ("0xdbd9d34f382e9f6ae078447a655e0816927c7c3edec70bd107de1d34cb15172e", "NZD"),
    ("0x9a788fb083188ba1dfb938605bc4ce3579d2e085989490aca8f73b23214b7c1d", "PLN"),
    ("0xf998cbeba8b7a7e91d4c469e5fb370cdfa16bd50aea760435dc346008d78ed1f", "SAR"),
    ("0xc241cc1f9752d2d53d1ab67189223a3f330e48b75f73ebf86f50b2c78fe8df88", "SGD"),
    ("0x326a6608c2a353275bd8d64db53a9d772c1d9a5bc8bfd19dfc8242274d1e9dd4", "THB"),
    ("0x128d6c262d1afe2351c6e93ceea68e00992708cfcbc0688408b9a23c0c543db2", "TRY"),
    ("0xc4ae21aac0c6549d71dd96035b7e0bdb6c79ebdba8891b666115bc976d16a29e", "USD"),
    ("0xe85548baf0a6732cfcc7fc016ce4fd35ce0a1877057cfec6e166af4f106a3728", "VND"),
    ("0x53611f0b3535a2cfc4b8deb57fa961ca36c7b2c272dfe4cb239a29c48e549361", "ZAR"),
    ("0x8fd50654b7dd2dc839f7cab32800ba0c6f7f66e1ccf89b21c09405469c2175ec", "ARS"),
];

const PLATFORMS: &[(&str, &str)] = &[
    ("0x76d33a33068d86016b806df02376ddbb23dd3703", "cashapp"),
    ("0x9a733b55a875d0db4915c6b36350b24f8ab99df5", "venmo"),
    ("0xaa5a1b62b01781e789c900d616300717cd9a41ab", "revolut"),
    ("0xff0149799631d7a5bde2e7ea9b306c42b3d9a9ca", "wise"),
    ("0xf2ac5be14f32cbe6a613cff8931d95460d6c33a3", "mercado pago"),
    ("0x431a078a5029146aab239c768a615cd484519af7", "zelle"),
];

lazy_static! {
    static ref CURRENCY_CODES: HashMap<B256, &'static str> = CURRENCIES
        .iter()
        .filter_map(|(hash, code)| B256::from_str(hash).ok().map(|h| (h, *code)))
        .collect();
    static ref PLATFORM_NAMES: HashMap<Address, &'static str> = PLATFORMS
        .iter()
        .filter_map(|(addr, name)| Address::from_str(addr).ok().map(|a| (a, *name)))
        .collect();
}

/// ISO code of a currency identified by the keccak hash of its code.
pub fn fiat_code(currency: &B256) -> Option<&'static str> {
    CURRENCY_CODES.get(currency).copied()
}

/// Payment platform served by a verifier contract.
pub fn platform_name(verifier: &Address) -> Option<&'static str> {
    PLATFORM_NAMES.get(verifier).copied()
}

fn fixed_point(raw: U256, decimals: u32) -> Option<Decimal> {
    let mantissa = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, decimals).ok()
}

/// Raw USDC amount in whole tokens.
///
/// `None` when the value does not fit a `Decimal`.
pub fn usdc_amount(raw: U256) -> Option<Decimal> {
    fixed_point(raw, USDC_DECIMALS)
}

/// 18-decimal conversion rate, rounded to 6 places.
pub fn conversion_rate(raw: U256) -> Option<Decimal> {
    fixed_point(raw, RATE_DECIMALS).map(|rate| rate.round_dp(6).normalize())
}
