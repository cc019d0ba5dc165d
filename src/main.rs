#[rocket::launch]
fn launch() -> _ {
    unfair_wheel::rocket()
}
