use tabula_orm::Entity;

#[derive(Entity)]
struct Country {
    code: String,
    population: Option<u32>,
}

fn main() {
    let mut country = Country {
        code: "SI".to_string(),
        population: None,
    };
    assert!(tabula_orm::schema::Entity::set_field(&mut country, "code", None).is_err());
}
