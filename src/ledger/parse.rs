//! Token account decoding for `getTokenAccountsByOwner` results.
//!
//! Nodes answer with `jsonParsed` data for known token programs; some
//! fall back to raw base64, which is unpacked with the SPL layouts.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use solana_account_decoder::{UiAccountData, UiAccountEncoding};
use solana_client::rpc_response::RpcKeyedAccount;
use solana_program::{program_option::COption, program_pack::Pack};
use solana_sdk::pubkey::Pubkey;
use spl_token_2022::extension::{
    transfer_fee::TransferFeeAmount, BaseStateWithExtensions, StateWithExtensions,
};

/// Balance as reported by the node. `amount` is the raw base-unit
/// integer in string form, exactly what the parsed encoding carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount_string: String,
}

impl TokenAmount {
    pub fn from_raw(amount: u64, decimals: u8) -> Self {
        Self {
            amount: amount.to_string(),
            decimals,
            ui_amount_string: amount.to_string(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount == "0"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAccountState {
    Uninitialized,
    Initialized,
    Frozen,
}

/// One token account as read from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountRecord {
    pub address: Pubkey,
    pub program_id: Pubkey,
    pub lamports: u64,
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: TokenAmount,
    pub state: TokenAccountState,
    pub is_native: bool,
    pub close_authority: Option<Pubkey>,
    /// Token-2022 transfer fees still held in the account; the program
    /// refuses to close it until they are harvested.
    pub withheld_fees: bool,
}

#[derive(Deserialize)]
struct ParsedEnvelope {
    #[serde(rename = "type")]
    kind: String,
    info: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedTokenInfo {
    mint: String,
    owner: String,
    token_amount: TokenAmount,
    state: TokenAccountState,
    #[serde(default)]
    is_native: bool,
    #[serde(default)]
    close_authority: Option<String>,
    #[serde(default)]
    extensions: Vec<ParsedExtension>,
}

#[derive(Deserialize)]
struct ParsedExtension {
    extension: String,
    #[serde(default)]
    state: serde_json::Value,
}

impl ParsedExtension {
    fn withheld_amount(&self) -> u64 {
        if self.extension != "transferFeeAmount" {
            return 0;
        }
        self.state["withheldAmount"].as_u64().unwrap_or(0)
    }
}

fn parse_pubkey(raw: &str, field: &str) -> Result<Pubkey> {
    Pubkey::from_str(raw).with_context(|| format!("invalid {field} pubkey `{raw}`"))
}

/// Decode the `parsed` object of a `jsonParsed` token account.
pub fn record_from_parsed_json(
    address: Pubkey,
    program_id: Pubkey,
    lamports: u64,
    parsed: serde_json::Value,
) -> Result<TokenAccountRecord> {
    let envelope: ParsedEnvelope =
        serde_json::from_value(parsed).context("parsed account envelope")?;
    if envelope.kind != "account" {
        bail!("{address} is a `{}`, not a token account", envelope.kind);
    }
    let info: ParsedTokenInfo =
        serde_json::from_value(envelope.info).context("parsed token account info")?;

    Ok(TokenAccountRecord {
        address,
        program_id,
        lamports,
        mint: parse_pubkey(&info.mint, "mint")?,
        owner: parse_pubkey(&info.owner, "owner")?,
        amount: info.token_amount,
        state: info.state,
        is_native: info.is_native,
        close_authority: info
            .close_authority
            .as_deref()
            .map(|raw| parse_pubkey(raw, "closeAuthority"))
            .transpose()?,
        withheld_fees: info.extensions.iter().any(|ext| ext.withheld_amount() > 0),
    })
}

fn from_coption(value: COption<Pubkey>) -> Option<Pubkey> {
    match value {
        COption::Some(key) => Some(key),
        COption::None => None,
    }
}

/// Unpack raw account bytes. Binary data carries no mint decimals, so
/// the amount is reported in base units.
pub fn record_from_binary(
    address: Pubkey,
    program_id: Pubkey,
    lamports: u64,
    data: &[u8],
) -> Result<TokenAccountRecord> {
    if program_id == spl_token_2022::id() {
        let unpacked = StateWithExtensions::<spl_token_2022::state::Account>::unpack(data)
            .map_err(|e| anyhow!("unpacking token-2022 account {address}: {e}"))?;
        let withheld_fees = unpacked
            .get_extension::<TransferFeeAmount>()
            .map(|fees| u64::from(fees.withheld_amount) > 0)
            .unwrap_or(false);
        let account = unpacked.base;
        let state = match account.state {
            spl_token_2022::state::AccountState::Uninitialized => TokenAccountState::Uninitialized,
            spl_token_2022::state::AccountState::Initialized => TokenAccountState::Initialized,
            spl_token_2022::state::AccountState::Frozen => TokenAccountState::Frozen,
        };
        return Ok(TokenAccountRecord {
            address,
            program_id,
            lamports,
            mint: account.mint,
            owner: account.owner,
            amount: TokenAmount::from_raw(account.amount, 0),
            state,
            is_native: account.is_native.is_some(),
            close_authority: from_coption(account.close_authority),
            withheld_fees,
        });
    }

    let account = spl_token::state::Account::unpack(data)
        .map_err(|e| anyhow!("unpacking token account {address}: {e}"))?;
    let state = match account.state {
        spl_token::state::AccountState::Uninitialized => TokenAccountState::Uninitialized,
        spl_token::state::AccountState::Initialized => TokenAccountState::Initialized,
        spl_token::state::AccountState::Frozen => TokenAccountState::Frozen,
    };
    Ok(TokenAccountRecord {
        address,
        program_id,
        lamports,
        mint: account.mint,
        owner: account.owner,
        amount: TokenAmount::from_raw(account.amount, 0),
        state,
        is_native: account.is_native.is_some(),
        close_authority: from_coption(account.close_authority),
        withheld_fees: false,
    })
}

/// Decode one RPC keyed account returned for `program_id`.
pub fn decode_keyed_account(keyed: RpcKeyedAccount, program_id: &Pubkey) -> Result<TokenAccountRecord> {
    let address = parse_pubkey(&keyed.pubkey, "account")?;
    let lamports = keyed.account.lamports;

    match keyed.account.data {
        UiAccountData::Json(parsed) => {
            record_from_parsed_json(address, *program_id, lamports, parsed.parsed)
        }
        UiAccountData::Binary(blob, UiAccountEncoding::Base64) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(blob)
                .with_context(|| format!("base64 data of {address}"))?;
            record_from_binary(address, *program_id, lamports, &bytes)
        }
        UiAccountData::Binary(_, encoding) => {
            Err(anyhow!("unsupported account encoding {encoding:?} for {address}"))
        }
        UiAccountData::LegacyBinary(blob) => {
            let bytes = bs58::decode(blob)
                .into_vec()
                .with_context(|| format!("base58 data of {address}"))?;
            record_from_binary(address, *program_id, lamports, &bytes)
        }
    }
}
