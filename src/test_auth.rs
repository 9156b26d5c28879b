#![cfg(test)]
use soroban_sdk::{
    testutils::{Address as _, Ledger as _},
    Address, Env,
};

use crate::{IfoPool, IfoPoolClient};

const START_LEDGER: u32 = 10;
const END_LEDGER: u32 = 20;

fn make_client(env: &Env) -> IfoPoolClient<'_> {
    let id = env.register_contract(None, IfoPool);
    IfoPoolClient::new(env, &id)
}

fn create_token(env: &Env) -> Address {
    let admin = Address::generate(env);
    env.register_stellar_asset_contract(admin)
}

fn jump_to(env: &Env, sequence: u32) {
    env.ledger().with_mut(|li| li.sequence_number = sequence);
}

/// Initialize a standard pool without mocking auths; `initialize` itself
/// requires no authorization (it is part of deployment wiring).
fn init_pool(env: &Env, client: &IfoPoolClient) {
    let raising_token = create_token(env);
    let offering_token = create_token(env);
    let collateral_token = create_token(env);
    let admin = Address::generate(env);
    client.initialize(
        &raising_token,
        &offering_token,
        &START_LEDGER,
        &END_LEDGER,
        &1_000,
        &1_000,
        &admin,
        &collateral_token,
        &500,
    );
}

#[test]
fn deposit_collateral_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_pool(&env, &client);
    let participant = Address::generate(&env);

    jump_to(&env, START_LEDGER);
    assert!(client.try_deposit_collateral(&participant).is_err());
    assert!(!client.has_collateral(&participant));
}

#[test]
fn deposit_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_pool(&env, &client);
    let participant = Address::generate(&env);

    jump_to(&env, START_LEDGER);
    assert!(client.try_deposit(&participant, &100).is_err());
    assert_eq!(client.get_deposit(&participant), 0);
    assert_eq!(client.total_raised(), 0);
}

#[test]
fn harvest_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_pool(&env, &client);
    let participant = Address::generate(&env);

    jump_to(&env, END_LEDGER);
    assert!(client.try_harvest(&participant).is_err());
    assert!(!client.has_harvested(&participant));
}

#[test]
fn set_offering_amount_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_pool(&env, &client);

    assert!(client.try_set_offering_amount(&2_000).is_err());
    assert_eq!(client.get_config().unwrap().offering_amount, 1_000);
}

#[test]
fn set_raising_amount_missing_auth_no_mutation() {
    let env = Env::default();
    let client = make_client(&env);
    init_pool(&env, &client);

    assert!(client.try_set_raising_amount(&2_000).is_err());
    assert_eq!(client.get_config().unwrap().raising_amount, 1_000);
}

#[test]
fn final_withdraw_missing_auth() {
    let env = Env::default();
    let client = make_client(&env);
    init_pool(&env, &client);

    jump_to(&env, END_LEDGER);
    assert!(client.try_final_withdraw(&0, &0).is_err());
}
