// Integration test suite for the unfair-wheel service
//
// Organized into focused modules by API surface. All modules share the
// common::TestClient for DB lifecycle management; identity tokens are minted
// with the test secret, standing in for the external identity provider.


mod commit;
mod spin;
mod system;
