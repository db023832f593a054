// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative user management, for identities the server grants an admin
//! role. Thin formatting over [`Client::authenticated_request`]; authorization
//! is entirely the server's call.

use serde_json::{json, Value};

use crate::client::Client;
use crate::error::Error;
use crate::transport::RequestOptions;

/// Admin API facade borrowed from a [`Client`].
pub struct Admin<'a> {
    client: &'a Client,
}

impl<'a> Admin<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// List all users in an audience.
    pub async fn list_users(&self, audience: &str) -> Result<Value, Error> {
        self.client
            .authenticated_request("/admin/users", RequestOptions::get().audience(audience))
            .await
    }

    /// Fetch a single user by id.
    pub async fn get_user(&self, id: &str) -> Result<Value, Error> {
        self.client.authenticated_request(&format!("/admin/user?id={id}"), RequestOptions::get()).await
    }

    /// Create a user directly, bypassing the signup flow.
    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        attributes: Value,
    ) -> Result<Value, Error> {
        let mut body = object_or_empty(attributes);
        body.insert("email".to_owned(), json!(email));
        body.insert("password".to_owned(), json!(password));
        self.client.authenticated_request("/admin/user", RequestOptions::post_json(body.into())).await
    }

    /// Update another user's attributes.
    pub async fn update_user(&self, user: &Value, attributes: Value) -> Result<Value, Error> {
        let mut body = object_or_empty(attributes);
        body.insert("user".to_owned(), user.clone());
        self.client.authenticated_request("/admin/user", RequestOptions::put_json(body.into())).await
    }

    /// Delete a user.
    pub async fn delete_user(&self, user: &Value) -> Result<Value, Error> {
        self.client
            .authenticated_request("/admin/user", RequestOptions::delete_json(user.clone()))
            .await
    }
}

fn object_or_empty(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}
