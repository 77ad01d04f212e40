//! # Magnite order server
//! This crate hosts the REST server for the Magnite store backend. It is responsible for:
//! Authenticating storefront and admin callers and enforcing their roles.
//! Accepting new orders and handing them to the order engine for stock reservation.
//! Opening payment intents at Stripe and recording them against payment attempts.
//! Listening for incoming webhook deliveries from Stripe and applying their outcomes.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/orders`: POST a cart to place an order; GET to list the caller's orders.
//! * `/api/orders/search`: Query orders across all customers. Admin only.
//! * `/api/orders/{id}`: A single order with its line items.
//! * `/api/orders/{id}/payment-status`: The lightweight payment status poll for the checkout page.
//! * `/api/orders/{id}/cancel`: POST to cancel an unpaid order and release its stock.
//! * `/api/payments/intent`: POST to open a Stripe payment intent for an order.
//! * `/api/transactions`: The caller's payment attempts.
//! * `/webhook/stripe`: The webhook route for receiving payment outcome events from Stripe.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
