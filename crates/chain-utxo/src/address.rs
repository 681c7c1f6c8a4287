use bitcoin::bech32::primitives::iter::{ByteIterExt, Fe32IterExt};
use bitcoin::bech32::{self, Fe32, Hrp};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::UtxoError;
use crate::params::AddressFormat;

/// Compute Hash160 (RIPEMD-160(SHA-256(data))).
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// P2PKH scriptPubKey: OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.push(0x76); // OP_DUP
    script.push(0xA9); // OP_HASH160
    script.push(0x14); // push 20 bytes
    script.extend_from_slice(pubkey_hash);
    script.push(0x88); // OP_EQUALVERIFY
    script.push(0xAC); // OP_CHECKSIG
    script
}

/// P2SH scriptPubKey: OP_HASH160 <20> OP_EQUAL
pub fn p2sh_script(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.push(0xA9);
    script.push(0x14);
    script.extend_from_slice(script_hash);
    script.push(0x87); // OP_EQUAL
    script
}

/// Witness program scriptPubKey: OP_n <program>
fn witness_script(version: u8, program: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(2 + program.len());
    script.push(if version == 0 { 0x00 } else { 0x50 + version });
    script.push(program.len() as u8);
    script.extend_from_slice(program);
    script
}

/// Resolve `address` to the scriptPubKey it pays, trying each accepted format.
pub fn address_to_script(address: &str, formats: &[AddressFormat]) -> Result<Vec<u8>, UtxoError> {
    let mut last_err = None;
    for format in formats {
        let decoded = match format {
            AddressFormat::Base58 { p2pkh, p2sh } => decode_base58(address, *p2pkh, *p2sh),
            AddressFormat::Segwit { hrp } => decode_segwit(address, hrp),
            AddressFormat::CashAddr { prefix } => decode_cashaddr(address, prefix),
        };
        match decoded {
            Ok(script) => return Ok(script),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| UtxoError::InvalidAddress("no address formats configured".into())))
}

/// Encode the standard single-key address for `pubkey` in `format`:
/// P2WPKH for segwit formats, P2PKH otherwise.
pub fn pubkey_to_address(pubkey: &[u8; 33], format: &AddressFormat) -> Result<String, UtxoError> {
    if pubkey[0] != 0x02 && pubkey[0] != 0x03 {
        return Err(UtxoError::InvalidAddress(
            "compressed key must start with 0x02 or 0x03".into(),
        ));
    }
    let pubkey_hash = hash160(pubkey);
    match format {
        AddressFormat::Base58 { p2pkh, .. } => Ok(encode_base58(*p2pkh, &pubkey_hash)),
        AddressFormat::Segwit { hrp } => {
            let hrp = Hrp::parse(hrp)
                .map_err(|e| UtxoError::InvalidAddress(format!("invalid hrp {hrp:?}: {e}")))?;
            bech32::segwit::encode(hrp, bech32::segwit::VERSION_0, &pubkey_hash)
                .map_err(|e| UtxoError::InvalidAddress(format!("bech32 encoding failed: {e}")))
        }
        AddressFormat::CashAddr { prefix } => Ok(encode_cashaddr(prefix, 0, &pubkey_hash)),
    }
}

fn encode_base58(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

fn decode_base58(address: &str, p2pkh: u8, p2sh: u8) -> Result<Vec<u8>, UtxoError> {
    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| UtxoError::InvalidAddress(format!("invalid base58check: {e}")))?;

    // 1 version byte + 20-byte hash
    if decoded.len() != 21 {
        return Err(UtxoError::InvalidAddress(format!(
            "expected 21 bytes, got {}",
            decoded.len()
        )));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&decoded[1..]);

    match decoded[0] {
        v if v == p2pkh => Ok(p2pkh_script(&hash)),
        v if v == p2sh => Ok(p2sh_script(&hash)),
        v => Err(UtxoError::InvalidAddress(format!(
            "unexpected version byte 0x{v:02x}"
        ))),
    }
}

fn decode_segwit(address: &str, expected_hrp: &str) -> Result<Vec<u8>, UtxoError> {
    let (hrp, version, program) = bech32::segwit::decode(address)
        .map_err(|e| UtxoError::InvalidAddress(format!("invalid segwit address: {e}")))?;
    if hrp.to_lowercase() != expected_hrp.to_lowercase() {
        return Err(UtxoError::InvalidAddress(format!(
            "wrong network prefix {:?}, expected {expected_hrp:?}",
            hrp.to_lowercase()
        )));
    }
    Ok(witness_script(version.to_u8(), &program))
}

fn cashaddr_polymod(values: &[u8]) -> u64 {
    const GENERATORS: [u64; 5] = [
        0x98f2bc8e61,
        0x79b76d99e2,
        0xf33e5fb3c4,
        0xae2eabe2a8,
        0x1e4f43e470,
    ];
    let mut c: u64 = 1;
    for &d in values {
        let c0 = c >> 35;
        c = ((c & 0x07_ffff_ffff) << 5) ^ u64::from(d);
        for (bit, generator) in GENERATORS.iter().enumerate() {
            if (c0 >> bit) & 1 == 1 {
                c ^= generator;
            }
        }
    }
    c ^ 1
}

fn prefix_values(prefix: &str) -> Vec<u8> {
    let mut values: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    values.push(0);
    values
}

fn encode_cashaddr(prefix: &str, kind: u8, hash: &[u8; 20]) -> String {
    // version byte: type in bits 3..7, size code 0 (160 bits)
    let mut payload = Vec::with_capacity(21);
    payload.push(kind << 3);
    payload.extend_from_slice(hash);
    let mut data: Vec<Fe32> = payload.iter().copied().bytes_to_fes().collect();

    let mut checksum_input = prefix_values(prefix);
    checksum_input.extend(data.iter().map(|fe| fe.to_u8()));
    checksum_input.extend_from_slice(&[0u8; 8]);
    let checksum = cashaddr_polymod(&checksum_input);
    for i in 0..8 {
        data.push(Fe32::try_from(((checksum >> (5 * (7 - i))) & 0x1f) as u8).unwrap_or(Fe32::Q));
    }

    let body: String = data.iter().map(|fe| fe.to_char()).collect();
    format!("{prefix}:{body}")
}

fn decode_cashaddr(address: &str, expected_prefix: &str) -> Result<Vec<u8>, UtxoError> {
    let has_lower = address.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = address.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(UtxoError::InvalidAddress("mixed-case cashaddr".into()));
    }
    let address = address.to_ascii_lowercase();
    let (prefix, body) = match address.split_once(':') {
        Some((p, b)) => (p.to_string(), b.to_string()),
        None => (expected_prefix.to_string(), address.clone()),
    };
    if prefix != expected_prefix {
        return Err(UtxoError::InvalidAddress(format!(
            "wrong cashaddr prefix {prefix:?}, expected {expected_prefix:?}"
        )));
    }

    let data = body
        .chars()
        .map(|c| {
            Fe32::from_char(c)
                .map_err(|_| UtxoError::InvalidAddress(format!("invalid cashaddr character {c:?}")))
        })
        .collect::<Result<Vec<Fe32>, UtxoError>>()?;
    if data.len() < 8 {
        return Err(UtxoError::InvalidAddress("cashaddr too short".into()));
    }

    let mut checksum_input = prefix_values(&prefix);
    checksum_input.extend(data.iter().map(|fe| fe.to_u8()));
    if cashaddr_polymod(&checksum_input) != 0 {
        return Err(UtxoError::InvalidAddress("cashaddr checksum mismatch".into()));
    }

    let symbols = &data[..data.len() - 8];
    let payload: Vec<u8> = symbols.iter().copied().fes_to_bytes().collect();
    // Padding must be zero and shorter than one symbol.
    if !payload.iter().copied().bytes_to_fes().eq(symbols.iter().copied()) {
        return Err(UtxoError::InvalidAddress("invalid cashaddr padding".into()));
    }
    // Only 160-bit hashes (size code 0) are standard for P2PKH/P2SH.
    if payload.len() != 21 || payload[0] & 0x07 != 0 {
        return Err(UtxoError::InvalidAddress("unsupported cashaddr hash size".into()));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);
    match payload[0] >> 3 {
        0 => Ok(p2pkh_script(&hash)),
        1 => Ok(p2sh_script(&hash)),
        kind => Err(UtxoError::InvalidAddress(format!(
            "unsupported cashaddr type {kind}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Chain, ChainParams, Network};

    const PUBKEY_HEX: &str = "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798";

    fn pubkey() -> [u8; 33] {
        hex::decode(PUBKEY_HEX).unwrap().try_into().unwrap()
    }

    fn formats(chain: Chain, network: Network) -> Vec<AddressFormat> {
        ChainParams::for_chain(chain, network).address_formats
    }

    #[test]
    fn p2wpkh_mainnet_test_vector() {
        let address = pubkey_to_address(&pubkey(), &AddressFormat::Segwit { hrp: "bc".into() }).unwrap();
        assert_eq!(address, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn bitcoin_scripts_match_bitcoin_crate() {
        for addr in [
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
        ] {
            let ours = address_to_script(addr, &formats(Chain::Bitcoin, Network::Mainnet)).unwrap();
            let theirs = addr
                .parse::<bitcoin::Address<bitcoin::address::NetworkUnchecked>>()
                .unwrap()
                .assume_checked()
                .script_pubkey();
            assert_eq!(ours, theirs.to_bytes());
        }
    }

    #[test]
    fn mainnet_address_rejected_on_testnet() {
        let result = address_to_script(
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
            &formats(Chain::Bitcoin, Network::Testnet),
        );
        assert!(matches!(result, Err(UtxoError::InvalidAddress(_))));
    }

    #[test]
    fn garbage_address_rejected() {
        for chain in Chain::ALL {
            assert!(address_to_script("notanaddress!!!", &formats(chain, Network::Mainnet)).is_err());
        }
    }

    #[test]
    fn cashaddr_matches_legacy_encoding() {
        let bch = formats(Chain::BitcoinCash, Network::Mainnet);
        let cash = address_to_script("bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a", &bch).unwrap();
        let legacy = address_to_script("1BpEi6DfDAUFd7GtittLSdBeYJvcoaVggu", &bch).unwrap();
        assert_eq!(cash, legacy);
        // prefix may be omitted
        let bare = address_to_script("qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a", &bch).unwrap();
        assert_eq!(bare, cash);
    }

    #[test]
    fn cashaddr_checksum_and_case_are_enforced() {
        let bch = formats(Chain::BitcoinCash, Network::Mainnet);
        assert!(address_to_script("bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6b", &bch).is_err());
        assert!(address_to_script("bitcoincash:Qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a", &bch).is_err());
        let upper = "BITCOINCASH:QPM2QSZNHKS23Z7629MMS6S4CWEF74VCWVY22GDX6A";
        assert!(address_to_script(upper, &bch).is_ok());
    }

    fn checksummed(prefix: &str, symbols: &[u8]) -> String {
        let mut input = prefix_values(prefix);
        input.extend_from_slice(symbols);
        input.extend_from_slice(&[0u8; 8]);
        let checksum = cashaddr_polymod(&input);
        let mut all = symbols.to_vec();
        for i in 0..8 {
            all.push(((checksum >> (5 * (7 - i))) & 0x1f) as u8);
        }
        let body: String = all.iter().map(|d| Fe32::try_from(*d).unwrap().to_char()).collect();
        format!("{prefix}:{body}")
    }

    #[test]
    fn cashaddr_encodes_known_vector() {
        let legacy = bs58::decode("1BpEi6DfDAUFd7GtittLSdBeYJvcoaVggu")
            .with_check(None)
            .into_vec()
            .unwrap();
        let hash: [u8; 20] = legacy[1..].try_into().unwrap();
        assert_eq!(
            encode_cashaddr("bitcoincash", 0, &hash),
            "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a"
        );
    }

    #[test]
    fn cashaddr_nonzero_padding_rejected() {
        let bch = formats(Chain::BitcoinCash, Network::Mainnet);
        let body = "qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a";
        let mut symbols: Vec<u8> = body[..body.len() - 8]
            .chars()
            .map(|c| Fe32::from_char(c).unwrap().to_u8())
            .collect();
        assert_eq!(checksummed("bitcoincash", &symbols), format!("bitcoincash:{body}"));

        // 21 bytes leave two padding bits in the last symbol
        *symbols.last_mut().unwrap() |= 1;
        let tampered = checksummed("bitcoincash", &symbols);
        assert_eq!(
            decode_cashaddr(&tampered, "bitcoincash"),
            Err(UtxoError::InvalidAddress("invalid cashaddr padding".into()))
        );
        assert!(address_to_script(&tampered, &bch).is_err());
    }

    #[test]
    fn derived_addresses_decode_to_p2pkh_or_p2wpkh() {
        let hash = hash160(&pubkey());
        for chain in Chain::ALL {
            for network in [Network::Mainnet, Network::Testnet] {
                let formats = formats(chain, network);
                let address = pubkey_to_address(&pubkey(), &formats[0]).unwrap();
                let script = address_to_script(&address, &formats).unwrap();
                let expected = match formats[0] {
                    AddressFormat::Segwit { .. } => witness_script(0, &hash),
                    _ => p2pkh_script(&hash),
                };
                assert_eq!(script, expected, "{chain} {network} {address}");
            }
        }
    }

    #[test]
    fn legacy_prefixes_per_chain() {
        let doge = pubkey_to_address(&pubkey(), &formats(Chain::Dogecoin, Network::Mainnet)[0]).unwrap();
        assert!(doge.starts_with('D'), "got {doge}");
        let ltc = pubkey_to_address(&pubkey(), &AddressFormat::Base58 { p2pkh: 0x30, p2sh: 0x32 }).unwrap();
        assert!(ltc.starts_with('L'), "got {ltc}");
        let ltc_segwit = pubkey_to_address(&pubkey(), &formats(Chain::Litecoin, Network::Mainnet)[0]).unwrap();
        assert!(ltc_segwit.starts_with("ltc1"), "got {ltc_segwit}");
    }

    #[test]
    fn dogecoin_rejects_bitcoin_address() {
        let result = address_to_script(
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa",
            &formats(Chain::Dogecoin, Network::Mainnet),
        );
        assert!(result.is_err());
    }

    #[test]
    fn invalid_pubkey_prefix_is_rejected() {
        let bad = [0u8; 33];
        assert!(pubkey_to_address(&bad, &AddressFormat::Base58 { p2pkh: 0, p2sh: 5 }).is_err());
    }
}
