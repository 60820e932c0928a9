// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    Normal,
    Low,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertType {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

/// A discrete event. Events are delivered one request each and never batched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Event {
    pub title: String,
    pub text: String,
    /// Unix time in seconds
    pub date_happened: i64,
    pub hostname: String,
    pub aggregation_key: String,
    pub source_type_name: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub alert_type: AlertType,
    pub source_ip: String,
}

impl Event {
    pub fn new(title: &str, text: &str) -> Self {
        Self {
            title: title.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }
}
