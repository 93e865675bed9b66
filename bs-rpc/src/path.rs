// Copyright (c) bs-node contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP path parser (C7): a versioned REST-like path grammar parsed into
//! a typed [`Method`] + parameter bag, grounded on
//! `src/protocols/protocol_native.cpp`'s handler enumeration and the
//! exact error taxonomy in §7. Total (§8 invariant 4): every input
//! string maps to a valid [`Request`] or a specific [`ParseError`].

use crate::error::ParseError;

pub type Hash32 = [u8; 32];

/// Either the block identified by height or by header hash, as carried
/// by every `…/block/…` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSelector {
    Height(u32),
    Hash(Hash32),
}

/// Every method name in §4.7's table, carrying its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Configuration,
    Top,
    Block(BlockSelector),
    BlockHeader(BlockSelector),
    BlockHeaderContext(BlockSelector),
    BlockDetails(BlockSelector),
    BlockTxs(BlockSelector),
    BlockFilter(BlockSelector, u8),
    BlockFilterHash(BlockSelector, u8),
    BlockFilterHeader(BlockSelector, u8),
    BlockTx(BlockSelector, u32),
    Tx(Hash32),
    TxHeader(Hash32),
    TxDetails(Hash32),
    Inputs(Hash32),
    Input(Hash32, u32),
    InputScript(Hash32, u32),
    InputWitness(Hash32, u32),
    Outputs(Hash32),
    Output(Hash32, u32),
    OutputScript(Hash32, u32),
    OutputSpender(Hash32, u32),
    OutputSpenders(Hash32, u32),
    Address(Hash32),
    AddressConfirmed(Hash32),
    AddressUnconfirmed(Hash32),
    AddressBalance(Hash32),
}

/// A fully parsed request (§3 "HTTP request model"), minus media
/// negotiation (handled separately — see [`crate::media`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub version: u32,
    pub method: Method,
}

/// Parse a raw request target (path plus optional query string) into a
/// [`Request`]. Consecutive separators collapse, trailing separators are
/// ignored, and the query string is stripped before grammar matching
/// (§4.7 "Normalization").
pub fn parse(target: &str) -> Result<Request, ParseError> {
    let raw_path = target.split('?').next().unwrap_or(target);
    let segments: Vec<&str> = raw_path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return Err(ParseError::EmptyPath);
    }

    let version = parse_version(segments[0])?;
    let rest = &segments[1..];
    if rest.is_empty() {
        return Err(ParseError::MissingTarget);
    }

    let method = match rest[0] {
        "configuration" => {
            expect_end(&rest[1..])?;
            Method::Configuration
        }
        "top" => {
            expect_end(&rest[1..])?;
            Method::Top
        }
        "block" => parse_block(&rest[1..])?,
        "tx" => parse_tx(&rest[1..])?,
        "input" => parse_inputs(&rest[1..])?,
        "output" => parse_outputs(&rest[1..])?,
        "address" => parse_address(&rest[1..])?,
        _ => return Err(ParseError::InvalidTarget),
    };

    Ok(Request { version, method })
}

fn expect_end(tail: &[&str]) -> Result<(), ParseError> {
    if tail.is_empty() {
        Ok(())
    } else {
        Err(ParseError::ExtraSegment)
    }
}

/// `v<positive-decimal>` with no leading zero (§4.7).
fn parse_version(segment: &str) -> Result<u32, ParseError> {
    let digits = segment.strip_prefix('v').ok_or(ParseError::MissingVersion)?;
    parse_positive_decimal(digits)
}

fn parse_positive_decimal(digits: &str) -> Result<u32, ParseError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber);
    }
    if digits.starts_with('0') {
        return Err(ParseError::InvalidNumber);
    }
    digits.parse::<u32>().map_err(|_| ParseError::InvalidNumber)
}

fn parse_u32(segment: &str) -> Result<u32, ParseError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber);
    }
    segment.parse::<u32>().map_err(|_| ParseError::InvalidNumber)
}

fn parse_u8(segment: &str) -> Result<u8, ParseError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber);
    }
    segment.parse::<u8>().map_err(|_| ParseError::InvalidNumber)
}

fn parse_hash(segment: &str) -> Result<Hash32, ParseError> {
    if segment.len() != 64 || !segment.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidHash);
    }
    let bytes = hex::decode(segment).map_err(|_| ParseError::InvalidHash)?;
    bytes.try_into().map_err(|_| ParseError::InvalidHash)
}

fn parse_selector(id_type: &str, value: Option<&&str>) -> Result<BlockSelector, ParseError> {
    match id_type {
        "height" => Ok(BlockSelector::Height(parse_u32(
            value.ok_or(ParseError::MissingHeight)?,
        )?)),
        "hash" => Ok(BlockSelector::Hash(parse_hash(
            value.ok_or(ParseError::MissingHash)?,
        )?)),
        _ => Err(ParseError::InvalidIdType),
    }
}

fn parse_block(rest: &[&str]) -> Result<Method, ParseError> {
    let id_type = rest.first().ok_or(ParseError::MissingIdType)?;
    let selector = parse_selector(id_type, rest.get(1))?;

    let tail = rest.get(2..).unwrap_or(&[]);
    if tail.is_empty() {
        return Ok(Method::Block(selector));
    }

    match tail[0] {
        "header" => match tail.get(1) {
            None => Ok(Method::BlockHeader(selector)),
            Some(&"context") => {
                expect_end(&tail[2..])?;
                Ok(Method::BlockHeaderContext(selector))
            }
            Some(_) => Err(ParseError::InvalidSubcomponent),
        },
        "details" => {
            expect_end(&tail[1..])?;
            Ok(Method::BlockDetails(selector))
        }
        "txs" => {
            expect_end(&tail[1..])?;
            Ok(Method::BlockTxs(selector))
        }
        "filter" => {
            let type_id = parse_u8(tail.get(1).ok_or(ParseError::MissingTypeId)?)?;
            match tail.get(2) {
                None => Ok(Method::BlockFilter(selector, type_id)),
                Some(&"hash") => {
                    expect_end(&tail[3..])?;
                    Ok(Method::BlockFilterHash(selector, type_id))
                }
                Some(&"header") => {
                    expect_end(&tail[3..])?;
                    Ok(Method::BlockFilterHeader(selector, type_id))
                }
                Some(_) => Err(ParseError::InvalidSubcomponent),
            }
        }
        "tx" => {
            let position = parse_u32(tail.get(1).ok_or(ParseError::MissingPosition)?)?;
            expect_end(&tail[2..])?;
            Ok(Method::BlockTx(selector, position))
        }
        _ => Err(ParseError::InvalidComponent),
    }
}

fn parse_tx(rest: &[&str]) -> Result<Method, ParseError> {
    let hash = parse_hash(rest.first().ok_or(ParseError::MissingHash)?)?;
    match rest.get(1) {
        None => Ok(Method::Tx(hash)),
        Some(&"header") => {
            expect_end(&rest[2..])?;
            Ok(Method::TxHeader(hash))
        }
        Some(&"details") => {
            expect_end(&rest[2..])?;
            Ok(Method::TxDetails(hash))
        }
        Some(_) => Err(ParseError::InvalidComponent),
    }
}

fn parse_inputs(rest: &[&str]) -> Result<Method, ParseError> {
    let hash = parse_hash(rest.first().ok_or(ParseError::MissingHash)?)?;
    let index = match rest.get(1) {
        None => return Ok(Method::Inputs(hash)),
        Some(segment) => parse_u32(segment)?,
    };
    match rest.get(2) {
        None => Ok(Method::Input(hash, index)),
        Some(&"script") => {
            expect_end(&rest[3..])?;
            Ok(Method::InputScript(hash, index))
        }
        Some(&"witness") => {
            expect_end(&rest[3..])?;
            Ok(Method::InputWitness(hash, index))
        }
        Some(_) => Err(ParseError::InvalidComponent),
    }
}

fn parse_outputs(rest: &[&str]) -> Result<Method, ParseError> {
    let hash = parse_hash(rest.first().ok_or(ParseError::MissingHash)?)?;
    let index = match rest.get(1) {
        None => return Ok(Method::Outputs(hash)),
        Some(segment) => parse_u32(segment)?,
    };
    match rest.get(2) {
        None => Ok(Method::Output(hash, index)),
        Some(&"script") => {
            expect_end(&rest[3..])?;
            Ok(Method::OutputScript(hash, index))
        }
        Some(&"spender") => {
            expect_end(&rest[3..])?;
            Ok(Method::OutputSpender(hash, index))
        }
        Some(&"spenders") => {
            expect_end(&rest[3..])?;
            Ok(Method::OutputSpenders(hash, index))
        }
        Some(_) => Err(ParseError::InvalidComponent),
    }
}

fn parse_address(rest: &[&str]) -> Result<Method, ParseError> {
    let hash = parse_hash(rest.first().ok_or(ParseError::MissingHash)?)?;
    match rest.get(1) {
        None => Ok(Method::Address(hash)),
        Some(&"confirmed") => {
            expect_end(&rest[2..])?;
            Ok(Method::AddressConfirmed(hash))
        }
        Some(&"unconfirmed") => {
            expect_end(&rest[2..])?;
            Ok(Method::AddressUnconfirmed(hash))
        }
        Some(&"balance") => {
            expect_end(&rest[2..])?;
            Ok(Method::AddressBalance(hash))
        }
        Some(_) => Err(ParseError::InvalidComponent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of_byte(low: u8) -> String {
        let mut hex = "00".repeat(31);
        hex.push_str(&format!("{low:02x}"));
        hex
    }

    #[test]
    fn s1_path_parse_success() {
        let req = parse("/v42/block/height/123456").unwrap();
        assert_eq!(req.version, 42);
        assert_eq!(req.method, Method::Block(BlockSelector::Height(123456)));
    }

    #[test]
    fn s2_path_parse_hash_with_collapsed_separators_and_query() {
        let hash_hex = hash_of_byte(0x42);
        let target = format!("//v42//block//hash//{hash_hex}//?foo=bar");
        let req = parse(&target).unwrap();
        assert_eq!(req.version, 42);
        let mut expected = [0u8; 32];
        expected[31] = 0x42;
        assert_eq!(req.method, Method::Block(BlockSelector::Hash(expected)));
    }

    #[test]
    fn s3_path_parse_error_invalid_hash() {
        let err = parse("/v3/block/hash/invalidhex").unwrap_err();
        assert_eq!(err, ParseError::InvalidHash);
    }

    #[test]
    fn empty_path_is_rejected() {
        assert_eq!(parse("").unwrap_err(), ParseError::EmptyPath);
        assert_eq!(parse("/").unwrap_err(), ParseError::EmptyPath);
    }

    #[test]
    fn missing_version_when_first_segment_lacks_v_prefix() {
        assert_eq!(parse("/42/top").unwrap_err(), ParseError::MissingVersion);
    }

    #[test]
    fn invalid_number_on_leading_zero_version() {
        assert_eq!(parse("/v042/top").unwrap_err(), ParseError::InvalidNumber);
        assert_eq!(parse("/v0/top").unwrap_err(), ParseError::InvalidNumber);
    }

    #[test]
    fn missing_target_when_only_version_present() {
        assert_eq!(parse("/v1").unwrap_err(), ParseError::MissingTarget);
    }

    #[test]
    fn invalid_target_for_unknown_root_element() {
        assert_eq!(parse("/v1/frobnicate").unwrap_err(), ParseError::InvalidTarget);
    }

    #[test]
    fn extra_segment_after_complete_method() {
        assert_eq!(parse("/v1/top/extra").unwrap_err(), ParseError::ExtraSegment);
    }

    #[test]
    fn configuration_and_top_round_trip() {
        assert_eq!(parse("/v1/configuration").unwrap().method, Method::Configuration);
        assert_eq!(parse("/v1/top").unwrap().method, Method::Top);
    }

    #[test]
    fn block_subresources_parse() {
        let hash_hex = hash_of_byte(1);
        let base = format!("/v1/block/hash/{hash_hex}");
        assert!(matches!(parse(&format!("{base}/header")).unwrap().method, Method::BlockHeader(_)));
        assert!(matches!(
            parse(&format!("{base}/header/context")).unwrap().method,
            Method::BlockHeaderContext(_)
        ));
        assert!(matches!(parse(&format!("{base}/details")).unwrap().method, Method::BlockDetails(_)));
        assert!(matches!(parse(&format!("{base}/txs")).unwrap().method, Method::BlockTxs(_)));
        assert!(matches!(parse(&format!("{base}/filter/0")).unwrap().method, Method::BlockFilter(_, 0)));
        assert!(matches!(
            parse(&format!("{base}/filter/0/hash")).unwrap().method,
            Method::BlockFilterHash(_, 0)
        ));
        assert!(matches!(
            parse(&format!("{base}/filter/0/header")).unwrap().method,
            Method::BlockFilterHeader(_, 0)
        ));
        assert!(matches!(parse(&format!("{base}/tx/3")).unwrap().method, Method::BlockTx(_, 3)));
    }

    #[test]
    fn block_missing_id_type_and_invalid_id_type() {
        assert_eq!(parse("/v1/block").unwrap_err(), ParseError::MissingIdType);
        assert_eq!(parse("/v1/block/fortnight/1").unwrap_err(), ParseError::InvalidIdType);
        assert_eq!(parse("/v1/block/height").unwrap_err(), ParseError::MissingHeight);
    }

    #[test]
    fn tx_family_parses() {
        let hash_hex = hash_of_byte(2);
        assert!(matches!(parse(&format!("/v1/tx/{hash_hex}")).unwrap().method, Method::Tx(_)));
        assert!(matches!(parse(&format!("/v1/tx/{hash_hex}/header")).unwrap().method, Method::TxHeader(_)));
        assert!(matches!(parse(&format!("/v1/tx/{hash_hex}/details")).unwrap().method, Method::TxDetails(_)));
    }

    #[test]
    fn input_and_output_families_parse() {
        let hash_hex = hash_of_byte(3);
        assert!(matches!(parse(&format!("/v1/input/{hash_hex}")).unwrap().method, Method::Inputs(_)));
        assert!(matches!(parse(&format!("/v1/input/{hash_hex}/1")).unwrap().method, Method::Input(_, 1)));
        assert!(matches!(
            parse(&format!("/v1/input/{hash_hex}/1/script")).unwrap().method,
            Method::InputScript(_, 1)
        ));
        assert!(matches!(
            parse(&format!("/v1/input/{hash_hex}/1/witness")).unwrap().method,
            Method::InputWitness(_, 1)
        ));

        assert!(matches!(parse(&format!("/v1/output/{hash_hex}")).unwrap().method, Method::Outputs(_)));
        assert!(matches!(parse(&format!("/v1/output/{hash_hex}/2")).unwrap().method, Method::Output(_, 2)));
        assert!(matches!(
            parse(&format!("/v1/output/{hash_hex}/2/script")).unwrap().method,
            Method::OutputScript(_, 2)
        ));
        assert!(matches!(
            parse(&format!("/v1/output/{hash_hex}/2/spender")).unwrap().method,
            Method::OutputSpender(_, 2)
        ));
        assert!(matches!(
            parse(&format!("/v1/output/{hash_hex}/2/spenders")).unwrap().method,
            Method::OutputSpenders(_, 2)
        ));
    }

    #[test]
    fn address_family_parses() {
        let hash_hex = hash_of_byte(4);
        assert!(matches!(parse(&format!("/v1/address/{hash_hex}")).unwrap().method, Method::Address(_)));
        assert!(matches!(
            parse(&format!("/v1/address/{hash_hex}/confirmed")).unwrap().method,
            Method::AddressConfirmed(_)
        ));
        assert!(matches!(
            parse(&format!("/v1/address/{hash_hex}/unconfirmed")).unwrap().method,
            Method::AddressUnconfirmed(_)
        ));
        assert!(matches!(
            parse(&format!("/v1/address/{hash_hex}/balance")).unwrap().method,
            Method::AddressBalance(_)
        ));
    }

    #[test]
    fn invalid_number_on_non_decimal_index() {
        let hash_hex = hash_of_byte(5);
        assert_eq!(parse(&format!("/v1/input/{hash_hex}/abc")).unwrap_err(), ParseError::InvalidNumber);
    }
}
