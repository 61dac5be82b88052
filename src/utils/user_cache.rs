use crate::teamwork::Token;
use anyhow::Error;
use std::{
    collections::HashMap,
    io::{Read, Write},
    path::Path,
};

pub(crate) const USER_CACHE_FILE: &str = ".teamwork-log";

type CachedUsers = HashMap<Token, i64>;

fn read_cached_users(path: &Path) -> Result<CachedUsers, Error> {
    if path.exists() && path.is_file() {
        let mut file = std::fs::File::open(path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bincode::deserialize(bytes.as_slice())?)
    } else {
        Ok(HashMap::new())
    }
}

fn save_cached_users(path: &Path, users: &CachedUsers) -> Result<(), Error> {
    let bytes = bincode::serialize(users)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes.as_slice())?;
    Ok(())
}

/// Remembers which user id a token resolved to, so `me.json` is called once per token.
pub(crate) fn set_cached_user_id(path: &Path, token: &Token, user_id: i64) -> Result<(), Error> {
    let mut users = read_cached_users(path)?;
    users.insert(token.clone(), user_id);
    save_cached_users(path, &users)
}

pub(crate) fn get_cached_user_id(path: &Path, token: &Token) -> Result<Option<i64>, Error> {
    Ok(read_cached_users(path)?.get(token).copied())
}
