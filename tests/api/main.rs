mod failure;
mod greeting;
mod health_check;
mod helpers;
mod not_found;
