// SPDX-License-Identifier: MIT

pub mod bookings;
pub mod email;
pub mod geocode;
pub mod otp;
pub mod password;
pub mod whatsapp;
